use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 支持的存储后端
pub const SUPPORTED_DATABASE_SCHEMES: [&str; 2] = ["memory:", "sqlite:"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `memory://` 或 `sqlite://path?mode=rwc`
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://batchsync.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl ConfigValidator for DatabaseConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_url_scheme(
            &self.url,
            "database.url",
            &SUPPORTED_DATABASE_SCHEMES,
        )?;
        ValidationUtils::validate_count(
            u64::from(self.max_connections),
            "database.max_connections",
            100,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_validation() {
        let config = DatabaseConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = config.clone();
        invalid_config.url = "postgresql://localhost/batchsync".to_string();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.max_connections = 0;
        assert!(invalid_config.validate().is_err());

        let memory = DatabaseConfig {
            url: "memory://".to_string(),
            max_connections: 1,
        };
        assert!(memory.validate().is_ok());
    }
}
