use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// 半开时间窗口 `[from, to)`
///
/// `to <= from` 时窗口为空，所有基于窗口的枚举都返回空序列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// 以 `start` 为起点、长度为 `length` 的窗口；溢出时截断到可表示的最大时间
    pub fn starting_at(start: DateTime<Utc>, length: Duration) -> Self {
        let end = start
            .checked_add_signed(length)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(start, end)
    }

    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant < self.to
    }

    pub fn duration(&self) -> Duration {
        if self.is_empty() {
            Duration::zero()
        } else {
            self.to - self.from
        }
    }
}

/// 时间字段是否满足秒级精度（不含亚秒分量）
pub fn has_second_accuracy(instant: &DateTime<Utc>) -> bool {
    instant.nanosecond() == 0
}

pub fn duration_has_second_accuracy(duration: &Duration) -> bool {
    *duration - Duration::seconds(duration.num_seconds()) == Duration::zero()
}

/// 截断到整秒，用于时钟读数等可信来源
pub fn truncate_to_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.with_nanosecond(0).unwrap_or(instant)
}

/// ISO-8601 时长编解码（`PT24H`、`PT1H30M`、`P1DT2H`）
///
/// 只支持周/天/时/分/秒这些定长单位，年和月没有固定长度，一律拒绝。
/// 秒只接受整数，与系统的秒级时间精度一致。
pub mod iso_duration {
    use chrono::Duration;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const DATE_UNITS: &[(char, i64)] = &[('W', 604_800), ('D', 86_400)];
    const TIME_UNITS: &[(char, i64)] = &[('H', 3_600), ('M', 60), ('S', 1)];

    pub fn parse(text: &str) -> Result<Duration, String> {
        let trimmed = text.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let rest = rest
            .strip_prefix('P')
            .ok_or_else(|| format!("无效的ISO-8601时长 '{text}': 必须以 P 开头"))?;
        if rest.is_empty() {
            return Err(format!("无效的ISO-8601时长 '{text}': 缺少时长分量"));
        }

        let (date_part, time_part) = match rest.split_once('T') {
            Some((date, time)) => (date, Some(time)),
            None => (rest, None),
        };

        let mut total = parse_components(text, date_part, DATE_UNITS)?;
        if let Some(time_part) = time_part {
            if time_part.is_empty() {
                return Err(format!("无效的ISO-8601时长 '{text}': T 之后缺少时间分量"));
            }
            total = total
                .checked_add(parse_components(text, time_part, TIME_UNITS)?)
                .ok_or_else(|| format!("ISO-8601时长 '{text}' 超出范围"))?;
        }

        let seconds = if negative { -total } else { total };
        Duration::try_seconds(seconds).ok_or_else(|| format!("ISO-8601时长 '{text}' 超出范围"))
    }

    fn parse_components(text: &str, part: &str, units: &[(char, i64)]) -> Result<i64, String> {
        let mut total: i64 = 0;
        let mut digits = String::new();
        let mut next_unit = 0;

        for ch in part.chars() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                continue;
            }
            let position = units[next_unit..]
                .iter()
                .position(|(unit, _)| *unit == ch)
                .ok_or_else(|| format!("无效的ISO-8601时长 '{text}': 不支持的单位 '{ch}'"))?;
            if digits.is_empty() {
                return Err(format!("无效的ISO-8601时长 '{text}': 单位 '{ch}' 前缺少数值"));
            }
            let value: i64 = digits
                .parse()
                .map_err(|_| format!("ISO-8601时长 '{text}' 超出范围"))?;
            let (_, factor) = units[next_unit + position];
            total = value
                .checked_mul(factor)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(|| format!("ISO-8601时长 '{text}' 超出范围"))?;
            next_unit += position + 1;
            digits.clear();
        }

        if !digits.is_empty() {
            return Err(format!("无效的ISO-8601时长 '{text}': 数值 {digits} 缺少单位"));
        }
        Ok(total)
    }

    /// 规范化输出：只使用时/分/秒，零时长为 `PT0S`
    pub fn format(duration: &Duration) -> String {
        let total = duration.num_seconds();
        let sign = if total < 0 { "-" } else { "" };
        let mut remaining = total.unsigned_abs();
        if remaining == 0 {
            return "PT0S".to_string();
        }

        let hours = remaining / 3_600;
        remaining %= 3_600;
        let minutes = remaining / 60;
        let seconds = remaining % 60;

        let mut out = format!("{sign}PT");
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if seconds > 0 {
            out.push_str(&format!("{seconds}S"));
        }
        out
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(de::Error::custom)
    }

    pub mod option {
        use chrono::Duration;
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(duration) => serializer.serialize_str(&super::format(duration)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|text| super::parse(&text).map_err(de::Error::custom))
                .transpose()
        }
    }
}
