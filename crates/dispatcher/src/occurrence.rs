use chrono::{DateTime, NaiveDate, Utc};

use batchsync_domain::{TimeWindow, TriggerRule};

/// 触发规则在窗口内展开的结果
#[derive(Debug, Clone)]
pub enum Generated<'a> {
    /// ONCE/DAYS/WEEKDAYS：按时间顺序的触发时刻
    Instants(Occurrences<'a>),
    /// CANCEL：屏蔽区间 `[anchorTime, anchorTime + duration)`
    Blackout(TimeWindow),
}

/// 触发时刻生成器
///
/// 纯函数，不依赖时钟和存储；同样的输入总是得到同样的序列。
pub struct OccurrenceGenerator;

impl OccurrenceGenerator {
    pub fn generate<'a>(rule: &'a TriggerRule, window: &TimeWindow) -> Generated<'a> {
        match rule.blackout() {
            Some(blackout) => Generated::Blackout(blackout),
            None => Generated::Instants(Self::instants(rule, window)),
        }
    }

    /// 窗口内的触发时刻；CANCEL 规则返回空序列
    pub fn instants<'a>(rule: &'a TriggerRule, window: &TimeWindow) -> Occurrences<'a> {
        let cursor = if window.is_empty() || rule.is_suppressing() {
            None
        } else {
            Some(window.from.date_naive())
        };
        Occurrences {
            rule,
            window: *window,
            cursor,
            last: window.to.date_naive(),
        }
    }
}

/// 惰性的触发时刻序列
///
/// 按天遍历窗口覆盖的日期，与规则的时刻组合后保留落在 `[from, to)` 内且满足日期过滤的时刻。
/// 可以 `clone` 后重新遍历。
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
    rule: &'a TriggerRule,
    window: TimeWindow,
    cursor: Option<NaiveDate>,
    last: NaiveDate,
}

impl Iterator for Occurrences<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if let TriggerRule::Once(once) = self.rule {
            self.cursor.take()?;
            return self
                .window
                .contains(once.anchor_time)
                .then_some(once.anchor_time);
        }

        let time_of_day = self.rule.time_of_day();
        loop {
            let date = self.cursor?;
            self.cursor = if date < self.last { date.succ_opt() } else { None };

            if !self.rule.matches_date(date) {
                continue;
            }
            let instant = date.and_time(time_of_day).and_utc();
            if self.window.contains(instant) {
                return Some(instant);
            }
        }
    }
}
