use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use batchsync_errors::Violation;

use crate::time::TimeWindow;
use crate::validation::{check_accuracy, Validate};

/// 有效期：闭区间 `[from, to]`，`ignored = true` 时定义整体失效
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityPeriod {
    #[serde(default = "ValidityPeriod::default_from")]
    pub from: DateTime<Utc>,
    #[serde(default = "ValidityPeriod::default_to")]
    pub to: DateTime<Utc>,
    #[serde(default)]
    pub ignored: bool,
}

impl ValidityPeriod {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            ignored: false,
        }
    }

    /// 2000-01-01T00:00:00Z
    pub fn default_from() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// 2999-12-31T23:59:59Z
    pub fn default_to() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2999, 12, 31, 23, 59, 59)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        !self.ignored && self.from <= instant && instant <= self.to
    }

    /// 与半开窗口 `[window.from, window.to)` 是否有交集
    pub fn overlaps(&self, window: &TimeWindow) -> bool {
        !self.ignored && !window.is_empty() && self.from < window.to && window.from <= self.to
    }
}

impl Default for ValidityPeriod {
    fn default() -> Self {
        Self::new(Self::default_from(), Self::default_to())
    }
}

impl Validate for ValidityPeriod {
    fn validate(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        check_accuracy("from", &self.from, &mut out);
        check_accuracy("to", &self.to, &mut out);
        if self.from > self.to {
            out.push(Violation::new("to", "有效期结束时间不能早于开始时间"));
        }
        out
    }
}
