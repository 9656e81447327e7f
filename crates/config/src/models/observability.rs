use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: {s}. Valid formats: json, pretty"
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_bind_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default().to_string(),
            metrics_enabled: false,
            metrics_bind_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// 已校验的配置上总是成功
    pub fn format(&self) -> crate::ConfigResult<LogFormat> {
        self.log_format
            .parse()
            .map_err(crate::ConfigError::Validation)
    }
}

impl ConfigValidator for ObservabilityConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_one_of(&self.log_level, "observability.log_level", &LOG_LEVELS)?;
        self.format()?;
        if self.metrics_enabled {
            ValidationUtils::validate_socket_addr(
                &self.metrics_bind_address,
                "observability.metrics_bind_address",
            )?;
        }
        Ok(())
    }
}
