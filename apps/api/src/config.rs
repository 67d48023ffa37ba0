//! API configuration module.
//!
//! Layered with the `config` crate:
//! built-in defaults → optional `dukan.toml` → `DUKAN_*` environment variables.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use dukan_core::validation::validate_exchange_rate;

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: String,

    /// JWT secret key for signing tokens
    pub jwt_secret: String,

    /// JWT access token lifetime in seconds
    pub jwt_access_lifetime_secs: i64,

    /// AFN per USD used until an operator sets a rate
    pub default_exchange_rate: f64,

    /// Allow any origin (development front-ends)
    pub cors_permissive: bool,
}

const DEV_JWT_SECRET: &str = "dukan-dev-secret-change-in-production";

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            http_port: 8080,
            database_path: "./dukan.db".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_access_lifetime_secs: 12 * 3600,
            default_exchange_rate: 70.0,
            cors_permissive: true,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `dukan.toml` (optional) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Environment::with_prefix("DUKAN"))
    }

    fn load_from(env: Environment) -> Result<Self, ConfigError> {
        let defaults = ApiConfig::default();

        let config: ApiConfig = Config::builder()
            .set_default("http_port", i64::from(defaults.http_port))?
            .set_default("database_path", defaults.database_path)?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_access_lifetime_secs", defaults.jwt_access_lifetime_secs)?
            .set_default("default_exchange_rate", defaults.default_exchange_rate)?
            .set_default("cors_permissive", defaults.cors_permissive)?
            .add_source(File::with_name("dukan").required(false))
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().len() < 16 {
            return Err(ConfigError::InvalidValue("jwt_secret".to_string()));
        }
        if self.jwt_access_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("jwt_access_lifetime_secs".to_string()));
        }
        validate_exchange_rate(self.default_exchange_rate)
            .map_err(|_| ConfigError::InvalidValue("default_exchange_rate".to_string()))?;
        Ok(())
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Environment::with_prefix("DUKAN").source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::load_from(env(&[])).unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.default_exchange_rate, 70.0);
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn test_environment_overrides() {
        let config = ApiConfig::load_from(env(&[
            ("DUKAN_HTTP_PORT", "9000"),
            ("DUKAN_DATABASE_PATH", "/var/lib/dukan/shop.db"),
            ("DUKAN_DEFAULT_EXCHANGE_RATE", "71.5"),
        ]))
        .unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.database_path, "/var/lib/dukan/shop.db");
        assert_eq!(config.default_exchange_rate, 71.5);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = ApiConfig::load_from(env(&[("DUKAN_JWT_SECRET", "short")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(field) if field == "jwt_secret"));

        let err = ApiConfig::load_from(env(&[("DUKAN_DEFAULT_EXCHANGE_RATE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }
}
