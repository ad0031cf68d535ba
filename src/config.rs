//! Environment-based Configuration for the Account Service
//!
//! All settings come from environment variables (a `.env` file is read first
//! by the binary). Every variable is optional.
//!
//! # Environment Variables
//!
//! ## HTTP
//! - `HTTP_PORT` - REST API port (default: 8080)
//! - `HTTP_IDLE_TIMEOUT` - Per-request deadline in seconds (default: 30)
//! - `HTTP_SHUTDOWN_GRACE_PERIOD` - Seconds to drain on shutdown (default: 30)
//! - `MONITORING_HTTP_PORT` - Probe and info port (default: 8081)
//!
//! ## Storage
//! - `ACCOUNT_SERVICE_DB` - SQLite path, or `:memory:` (default: data/accounts.db)
//! - `ACCOUNT_SERVICE_DB_POOL_SIZE` - Connection pool size (default: 10)
//!
//! ## Logging
//! - `LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! - `LOG_FORMAT` - "json" or "pretty" (default: json)

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::logging::LogFormat;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub port: u16,
    /// Deadline for a single request's work
    pub idle_timeout: Duration,
    pub shutdown_grace_period: Duration,
    pub monitoring_port: u16,
}

/// Database settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// Main configuration struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                port: 8080,
                idle_timeout: Duration::from_secs(30),
                shutdown_grace_period: Duration::from_secs(30),
                monitoring_port: 8081,
            },
            database: DatabaseConfig {
                path: "data/accounts.db".to_string(),
                pool_size: 10,
            },
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_or(&lookup, "HTTP_PORT", defaults.http.port)?;
        let monitoring_port = parse_or(&lookup, "MONITORING_HTTP_PORT", defaults.http.monitoring_port)?;
        let idle_timeout = parse_or(&lookup, "HTTP_IDLE_TIMEOUT", defaults.http.idle_timeout.as_secs())?;
        let grace = parse_or(
            &lookup,
            "HTTP_SHUTDOWN_GRACE_PERIOD",
            defaults.http.shutdown_grace_period.as_secs(),
        )?;

        if port == monitoring_port {
            return Err(ConfigError::InvalidValue(
                "MONITORING_HTTP_PORT".to_string(),
                format!("must differ from HTTP_PORT ({})", port),
            ));
        }

        let path = lookup("ACCOUNT_SERVICE_DB")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.database.path);

        let pool_size = parse_or(&lookup, "ACCOUNT_SERVICE_DB_POOL_SIZE", defaults.database.pool_size)?;
        if pool_size == 0 {
            return Err(ConfigError::InvalidValue(
                "ACCOUNT_SERVICE_DB_POOL_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let log_level = lookup("LOG_LEVEL").unwrap_or(defaults.log_level);
        let log_format = parse_or(&lookup, "LOG_FORMAT", defaults.log_format)?;

        Ok(Self {
            http: HttpConfig {
                port,
                idle_timeout: Duration::from_secs(idle_timeout),
                shutdown_grace_period: Duration::from_secs(grace),
                monitoring_port,
            },
            database: DatabaseConfig { path, pool_size },
            log_level,
            log_format,
        })
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            http_port = self.http.port,
            monitoring_port = self.http.monitoring_port,
            idle_timeout_secs = self.http.idle_timeout.as_secs(),
            grace_period_secs = self.http.shutdown_grace_period.as_secs(),
            database = %self.database.path,
            pool_size = self.database.pool_size,
            "configuration loaded"
        );
    }
}

/// Parse `name` if set, otherwise use `default`
fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), format!("{}: {}", raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.monitoring_port, 8081);
        assert_eq!(config.database.path, "data/accounts.db");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("HTTP_PORT", "9000"),
            ("HTTP_IDLE_TIMEOUT", "5"),
            ("ACCOUNT_SERVICE_DB", ":memory:"),
            ("ACCOUNT_SERVICE_DB_POOL_SIZE", "4"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.database.path, ":memory:");
        assert_eq!(config.database.pool_size, 4);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("HTTP_PORT", "eighty")]),
            Err(ConfigError::InvalidValue(name, _)) if name == "HTTP_PORT"
        ));
        assert!(load(&[("HTTP_PORT", "8081")]).is_err());
        assert!(load(&[("ACCOUNT_SERVICE_DB_POOL_SIZE", "0")]).is_err());
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
