use std::net::SocketAddr;

use crate::{ConfigError, ConfigResult};

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate that a count is within `1..=max`
    pub fn validate_count(count: u64, field_name: &str, max: u64) -> ConfigResult<()> {
        if count == 0 {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if count > max {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be less than or equal to {max}"
            )));
        }
        Ok(())
    }

    /// Validate that a URL starts with one of the supported schemes
    pub fn validate_url_scheme(url: &str, field_name: &str, schemes: &[&str]) -> ConfigResult<()> {
        Self::validate_not_empty(url, field_name)?;
        if !schemes.iter().any(|scheme| url.starts_with(scheme)) {
            return Err(ConfigError::Validation(format!(
                "{field_name} must start with one of {schemes:?}"
            )));
        }
        Ok(())
    }

    /// Validate a `host:port` socket address
    pub fn validate_socket_addr(value: &str, field_name: &str) -> ConfigResult<()> {
        value.parse::<SocketAddr>().map(|_| ()).map_err(|e| {
            ConfigError::Validation(format!("{field_name} is not a valid address: {e}"))
        })
    }

    /// Validate that a value is one of the allowed options (case-insensitive)
    pub fn validate_one_of(value: &str, field_name: &str, allowed: &[&str]) -> ConfigResult<()> {
        if !allowed.iter().any(|option| option.eq_ignore_ascii_case(value)) {
            return Err(ConfigError::Validation(format!(
                "Invalid {field_name}: {value}. Valid options: {allowed:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_empty() {
        assert!(ValidationUtils::validate_not_empty("test", "field").is_ok());
        assert!(ValidationUtils::validate_not_empty("", "field").is_err());
        assert!(ValidationUtils::validate_not_empty("   ", "field").is_err());
    }

    #[test]
    fn test_validate_count() {
        assert!(ValidationUtils::validate_count(1, "test", 100).is_ok());
        assert!(ValidationUtils::validate_count(100, "test", 100).is_ok());
        assert!(ValidationUtils::validate_count(0, "test", 100).is_err());
        assert!(ValidationUtils::validate_count(101, "test", 100).is_err());
    }

    #[test]
    fn test_validate_url_scheme() {
        let schemes = ["memory:", "sqlite:"];
        assert!(ValidationUtils::validate_url_scheme("memory://", "url", &schemes).is_ok());
        assert!(ValidationUtils::validate_url_scheme("sqlite://a.db", "url", &schemes).is_ok());
        assert!(ValidationUtils::validate_url_scheme("postgres://x", "url", &schemes).is_err());
        assert!(ValidationUtils::validate_url_scheme("", "url", &schemes).is_err());
    }

    #[test]
    fn test_validate_socket_addr_and_options() {
        assert!(ValidationUtils::validate_socket_addr("0.0.0.0:9090", "addr").is_ok());
        assert!(ValidationUtils::validate_socket_addr("localhost", "addr").is_err());
        assert!(ValidationUtils::validate_one_of("JSON", "format", &["json", "pretty"]).is_ok());
        assert!(ValidationUtils::validate_one_of("xml", "format", &["json", "pretty"]).is_err());
    }
}
