//! # 触发规则
//!
//! 四种互斥的触发规则：`ONCE`、`DAYS`、`WEEKDAYS`、`CANCEL`。前三种产生作业创建时刻，
//! `CANCEL` 只描述一个屏蔽窗口 `[anchorTime, anchorTime + duration)`。
//!
//! 持久化形态以 `kind` 字段区分：
//!
//! ```json
//! {"kind":"DAYS","anchorTime":"2024-01-01T07:00:00Z","months":[1,7],"days":[5,25]}
//! {"kind":"CANCEL","anchorTime":"2024-01-01T00:00:00Z","duration":"PT24H"}
//! ```
//!
//! 解码分两步：先读取 `kind`，再把整个对象解码为对应的变体。
//! 反序列化只做形态检查；外部输入请使用 [`TriggerRule::parse`]，它会额外执行校验。

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use batchsync_errors::{SchedulerError, SchedulerResult, Violation};

use crate::time::{duration_has_second_accuracy, iso_duration, TimeWindow};
use crate::validation::{check_accuracy, check_range, ensure_valid, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl From<DayOfWeek> for Weekday {
    fn from(day: DayOfWeek) -> Self {
        match day {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }
}

/// 日期在当月是该星期几的第几次出现（1..=5）
pub fn week_of_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnceTrigger {
    pub anchor_time: DateTime<Utc>,
}

/// 按月份与日期匹配，空集合表示通配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaysTrigger {
    pub anchor_time: DateTime<Utc>,
    #[serde(default)]
    pub months: BTreeSet<u32>,
    #[serde(default)]
    pub days: BTreeSet<u32>,
}

/// 按月份、月内第几周与星期几匹配，空集合表示通配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekdaysTrigger {
    pub anchor_time: DateTime<Utc>,
    #[serde(default)]
    pub months: BTreeSet<u32>,
    #[serde(default)]
    pub weeks: BTreeSet<u32>,
    #[serde(default)]
    pub weekdays: BTreeSet<DayOfWeek>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelTrigger {
    pub anchor_time: DateTime<Utc>,
    #[serde(with = "iso_duration")]
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Once,
    Days,
    Weekdays,
    Cancel,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Once => "ONCE",
            TriggerKind::Days => "DAYS",
            TriggerKind::Weekdays => "WEEKDAYS",
            TriggerKind::Cancel => "CANCEL",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONCE" => Ok(TriggerKind::Once),
            "DAYS" => Ok(TriggerKind::Days),
            "WEEKDAYS" => Ok(TriggerKind::Weekdays),
            "CANCEL" => Ok(TriggerKind::Cancel),
            other => Err(SchedulerError::validation(
                "kind",
                format!("无法识别的触发器类型: {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerRule {
    Once(OnceTrigger),
    Days(DaysTrigger),
    Weekdays(WeekdaysTrigger),
    Cancel(CancelTrigger),
}

impl TriggerRule {
    pub fn once(anchor_time: DateTime<Utc>) -> SchedulerResult<Self> {
        Self::checked(TriggerRule::Once(OnceTrigger { anchor_time }))
    }

    pub fn days<M, D>(anchor_time: DateTime<Utc>, months: M, days: D) -> SchedulerResult<Self>
    where
        M: IntoIterator<Item = u32>,
        D: IntoIterator<Item = u32>,
    {
        Self::checked(TriggerRule::Days(DaysTrigger {
            anchor_time,
            months: months.into_iter().collect(),
            days: days.into_iter().collect(),
        }))
    }

    pub fn weekdays<M, W, D>(
        anchor_time: DateTime<Utc>,
        months: M,
        weeks: W,
        weekdays: D,
    ) -> SchedulerResult<Self>
    where
        M: IntoIterator<Item = u32>,
        W: IntoIterator<Item = u32>,
        D: IntoIterator<Item = DayOfWeek>,
    {
        Self::checked(TriggerRule::Weekdays(WeekdaysTrigger {
            anchor_time,
            months: months.into_iter().collect(),
            weeks: weeks.into_iter().collect(),
            weekdays: weekdays.into_iter().collect(),
        }))
    }

    pub fn cancel(anchor_time: DateTime<Utc>, duration: Duration) -> SchedulerResult<Self> {
        Self::checked(TriggerRule::Cancel(CancelTrigger {
            anchor_time,
            duration,
        }))
    }

    fn checked(rule: TriggerRule) -> SchedulerResult<Self> {
        ensure_valid(&rule)?;
        Ok(rule)
    }

    /// 两阶段解码：按 `kind` 选择变体，不做范围校验
    pub fn decode(value: Value) -> SchedulerResult<Self> {
        let kind: TriggerKind = value
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| SchedulerError::validation("kind", "缺少触发器类型字段"))?
            .parse()?;

        let shape_error =
            |e: serde_json::Error| SchedulerError::validation(kind.as_str(), e.to_string());
        let rule = match kind {
            TriggerKind::Once => TriggerRule::Once(serde_json::from_value(value).map_err(shape_error)?),
            TriggerKind::Days => TriggerRule::Days(serde_json::from_value(value).map_err(shape_error)?),
            TriggerKind::Weekdays => {
                TriggerRule::Weekdays(serde_json::from_value(value).map_err(shape_error)?)
            }
            TriggerKind::Cancel => {
                TriggerRule::Cancel(serde_json::from_value(value).map_err(shape_error)?)
            }
        };
        Ok(rule)
    }

    /// 解码并校验，用于外部输入
    pub fn parse(value: Value) -> SchedulerResult<Self> {
        Self::checked(Self::decode(value)?)
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            TriggerRule::Once(_) => TriggerKind::Once,
            TriggerRule::Days(_) => TriggerKind::Days,
            TriggerRule::Weekdays(_) => TriggerKind::Weekdays,
            TriggerRule::Cancel(_) => TriggerKind::Cancel,
        }
    }

    pub fn anchor_time(&self) -> DateTime<Utc> {
        match self {
            TriggerRule::Once(t) => t.anchor_time,
            TriggerRule::Days(t) => t.anchor_time,
            TriggerRule::Weekdays(t) => t.anchor_time,
            TriggerRule::Cancel(t) => t.anchor_time,
        }
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.anchor_time().time()
    }

    /// CANCEL 规则只屏蔽，不产生时刻
    pub fn is_suppressing(&self) -> bool {
        matches!(self, TriggerRule::Cancel(_))
    }

    /// 屏蔽窗口；非 CANCEL 规则返回 `None`
    pub fn blackout(&self) -> Option<TimeWindow> {
        match self {
            TriggerRule::Cancel(t) => Some(TimeWindow::starting_at(t.anchor_time, t.duration)),
            _ => None,
        }
    }

    /// 日期成员判定：该日期是否属于规则描述的集合
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        match self {
            TriggerRule::Once(t) => t.anchor_time.date_naive() == date,
            TriggerRule::Days(t) => {
                matches_filter(&t.months, &date.month()) && matches_filter(&t.days, &date.day())
            }
            TriggerRule::Weekdays(t) => {
                matches_filter(&t.months, &date.month())
                    && matches_filter(&t.weeks, &week_of_month(date))
                    && matches_filter(&t.weekdays, &DayOfWeek::from(date.weekday()))
            }
            TriggerRule::Cancel(_) => false,
        }
    }
}

fn matches_filter<T: Ord>(filter: &BTreeSet<T>, value: &T) -> bool {
    filter.is_empty() || filter.contains(value)
}

impl Validate for TriggerRule {
    fn validate(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        check_accuracy("anchorTime", &self.anchor_time(), &mut out);
        match self {
            TriggerRule::Once(_) => {}
            TriggerRule::Days(t) => {
                check_range("months", &t.months, 1, 12, &mut out);
                check_range("days", &t.days, 1, 31, &mut out);
            }
            TriggerRule::Weekdays(t) => {
                check_range("months", &t.months, 1, 12, &mut out);
                check_range("weeks", &t.weeks, 1, 5, &mut out);
            }
            TriggerRule::Cancel(t) => {
                if t.duration < Duration::zero() {
                    out.push(Violation::new("duration", "屏蔽时长不能为负"));
                }
                if !duration_has_second_accuracy(&t.duration) {
                    out.push(Violation::new("duration", "时长精度必须为整秒"));
                }
            }
        }
        out
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
enum TriggerRepr<'a> {
    Once(&'a OnceTrigger),
    Days(&'a DaysTrigger),
    Weekdays(&'a WeekdaysTrigger),
    Cancel(&'a CancelTrigger),
}

impl Serialize for TriggerRule {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let repr = match self {
            TriggerRule::Once(t) => TriggerRepr::Once(t),
            TriggerRule::Days(t) => TriggerRepr::Days(t),
            TriggerRule::Weekdays(t) => TriggerRepr::Weekdays(t),
            TriggerRule::Cancel(t) => TriggerRepr::Cancel(t),
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TriggerRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        TriggerRule::decode(value).map_err(de::Error::custom)
    }
}
