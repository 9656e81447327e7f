use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, ConfigBuilder as Builder, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};

use super::{
    database::DatabaseConfig, observability::ObservabilityConfig, scheduling::SchedulingConfig,
};
use crate::validation::ConfigValidator;

/// 环境变量前缀，形如 `BATCHSYNC__SCHEDULER__POLL_INTERVAL_SECONDS`
pub const ENV_PREFIX: &str = "BATCHSYNC";
const ENV_SEPARATOR: &str = "__";

/// 未显式指定配置文件时依次查找的位置
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/batchsync.toml",
    "batchsync.toml",
    "/etc/batchsync/config.toml",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scheduler: SchedulingConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 依次叠加默认值、配置文件和环境变量
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_with_env(config_path, None)
    }

    /// 同 [`AppConfig::load`]，`env` 为 `Some` 时用它代替进程环境变量
    pub fn load_with_env(config_path: Option<&str>, env: Option<Map<String, String>>) -> Result<Self> {
        let mut builder = Self::defaults()?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    fn defaults() -> Result<Builder<config::builder::DefaultState>> {
        let defaults = AppConfig::default();
        let builder = ConfigBuilder::builder()
            .set_default("database.url", defaults.database.url)?
            .set_default(
                "database.max_connections",
                i64::from(defaults.database.max_connections),
            )?
            .set_default("scheduler.enabled", defaults.scheduler.enabled)?
            .set_default(
                "scheduler.poll_interval_seconds",
                defaults.scheduler.poll_interval_seconds as i64,
            )?
            .set_default(
                "scheduler.lookahead_seconds",
                defaults.scheduler.lookahead_seconds as i64,
            )?
            .set_default(
                "scheduler.lookback_seconds",
                defaults.scheduler.lookback_seconds as i64,
            )?
            .set_default(
                "scheduler.timeout_sweep_enabled",
                defaults.scheduler.timeout_sweep_enabled,
            )?
            .set_default("observability.log_level", defaults.observability.log_level)?
            .set_default("observability.log_format", defaults.observability.log_format)?
            .set_default(
                "observability.metrics_enabled",
                defaults.observability.metrics_enabled,
            )?
            .set_default(
                "observability.metrics_bind_address",
                defaults.observability.metrics_bind_address,
            )?;
        Ok(builder)
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.database.validate()?;
        self.scheduler.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.scheduler.poll_interval_seconds, 60);
        assert_eq!(config.scheduler.lookahead_seconds, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_toml_round_trip() {
        let config = AppConfig::default();
        let serialized = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml(&serialized).unwrap(), config);
    }

    #[test]
    fn test_app_config_from_toml() {
        let toml_str = r#"
[database]
url = "memory://"
max_connections = 1

[scheduler]
enabled = true
poll_interval_seconds = 10
lookahead_seconds = 600
lookback_seconds = 300
timeout_sweep_enabled = false

[observability]
log_level = "debug"
log_format = "json"
metrics_enabled = true
metrics_bind_address = "127.0.0.1:9100"
"#;

        let config = AppConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.database.url, "memory://");
        assert_eq!(config.scheduler.lookback_seconds, 300);
        assert!(!config.scheduler.timeout_sweep_enabled);
        assert_eq!(config.observability.format().unwrap(), crate::LogFormat::Json);
    }

    #[test]
    fn test_app_config_from_toml_rejects_invalid() {
        let toml_str = r#"
[database]
url = "mysql://localhost/batchsync"
max_connections = 1

[scheduler]
enabled = true
poll_interval_seconds = 10
lookahead_seconds = 600
lookback_seconds = 0
timeout_sweep_enabled = true

[observability]
log_level = "info"
log_format = "pretty"
metrics_enabled = false
metrics_bind_address = "0.0.0.0:9090"
"#;
        assert!(AppConfig::from_toml(toml_str).is_err());
    }
}
