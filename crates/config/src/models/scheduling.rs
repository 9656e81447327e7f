use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 展开窗口的上限：366 天
const MAX_WINDOW_SECONDS: u64 = 366 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub enabled: bool,
    pub poll_interval_seconds: u64,
    pub lookahead_seconds: u64,
    pub lookback_seconds: u64,
    pub timeout_sweep_enabled: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_seconds: 60,
            lookahead_seconds: 3600,
            lookback_seconds: 0,
            timeout_sweep_enabled: true,
        }
    }
}

impl SchedulingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn lookahead(&self) -> Duration {
        Duration::from_secs(self.lookahead_seconds)
    }

    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_seconds)
    }
}

impl ConfigValidator for SchedulingConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_count(
            self.poll_interval_seconds,
            "scheduler.poll_interval_seconds",
            24 * 60 * 60,
        )?;
        ValidationUtils::validate_count(
            self.lookahead_seconds,
            "scheduler.lookahead_seconds",
            MAX_WINDOW_SECONDS,
        )?;
        if self.lookback_seconds > MAX_WINDOW_SECONDS {
            return Err(crate::ConfigError::Validation(format!(
                "scheduler.lookback_seconds must be less than or equal to {MAX_WINDOW_SECONDS}"
            )));
        }
        Ok(())
    }
}
