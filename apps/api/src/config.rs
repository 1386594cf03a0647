//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//! `main` loads a `.env` file first, so either source works.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tienda_cloud::config::{default_api_base, default_user_agent};
use tienda_cloud::{CloudConfig, SyncConfig};
use tienda_core::{Percentage, DEFAULT_RESERVATION_EXPIRY_DAYS};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HTTP listen address
    pub bind_addr: SocketAddr,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Connection pool size
    pub db_max_connections: u32,

    /// Days until a new reservation expires
    pub reservation_expiry_days: i64,

    /// Cloud store client settings
    pub cloud: CloudConfig,

    /// Bulk sync worker settings
    pub sync: SyncConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            database_path: PathBuf::from("./data/tienda.db"),
            db_max_connections: 5,
            reservation_expiry_days: DEFAULT_RESERVATION_EXPIRY_DAYS,
            cloud: CloudConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ApiConfig::default();
        let text = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let markup_percent: f64 = parse_or(&text, "TIENDANUBE_PRICE_MARKUP_PERCENT", 0.0)?;
        if !markup_percent.is_finite() || markup_percent < 0.0 {
            return Err(ConfigError::InvalidValue(
                "TIENDANUBE_PRICE_MARKUP_PERCENT".to_string(),
            ));
        }

        let reservation_expiry_days = parse_or(
            &text,
            "RESERVATION_EXPIRY_DAYS",
            defaults.reservation_expiry_days,
        )?;
        if reservation_expiry_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "RESERVATION_EXPIRY_DAYS".to_string(),
            ));
        }

        let queue_capacity: usize =
            parse_or(&text, "SYNC_QUEUE_CAPACITY", defaults.sync.queue_capacity)?;
        if queue_capacity == 0 {
            return Err(ConfigError::InvalidValue("SYNC_QUEUE_CAPACITY".to_string()));
        }

        let config = ApiConfig {
            bind_addr: parse_or(&text, "BIND_ADDR", defaults.bind_addr)?,

            database_path: text("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            db_max_connections: parse_or(
                &text,
                "DB_MAX_CONNECTIONS",
                defaults.db_max_connections,
            )?,

            reservation_expiry_days,

            cloud: CloudConfig {
                store_id: text("TIENDANUBE_USER_ID"),
                access_token: text("TIENDANUBE_ACCESS_TOKEN"),
                user_agent: text("TIENDANUBE_USER_AGENT").unwrap_or_else(default_user_agent),
                client_secret: text("TIENDANUBE_CLIENT_SECRET"),
                api_base: text("TIENDANUBE_API_BASE").unwrap_or_else(default_api_base),
                price_markup: Percentage::from_percent(markup_percent),
                timeout: Duration::from_secs(parse_or(
                    &text,
                    "TIENDANUBE_TIMEOUT_SECS",
                    defaults.cloud.timeout.as_secs(),
                )?),
            },

            sync: SyncConfig {
                queue_capacity,
                max_retries: parse_or(&text, "SYNC_MAX_RETRIES", defaults.sync.max_retries)?,
                ..defaults.sync
            },
        };

        Ok(config)
    }
}

fn parse_or<T, F>(text: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match text(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.database_path, PathBuf::from("./data/tienda.db"));
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.reservation_expiry_days, 15);
        assert!(!config.cloud.is_enabled());
        assert_eq!(config.cloud.timeout, Duration::from_secs(30));
        assert_eq!(config.sync.queue_capacity, 16);
        assert_eq!(config.sync.max_retries, 3);
    }

    #[test]
    fn test_cloud_enabled_with_credentials() {
        let config = load(&[
            ("TIENDANUBE_USER_ID", "123"),
            ("TIENDANUBE_ACCESS_TOKEN", "secret"),
            ("TIENDANUBE_PRICE_MARKUP_PERCENT", "7.5"),
        ])
        .unwrap();
        assert!(config.cloud.is_enabled());
        assert_eq!(config.cloud.price_markup, Percentage::from_bps(750));
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = load(&[("TIENDANUBE_USER_ID", "  "), ("BIND_ADDR", "")]).unwrap();
        assert!(config.cloud.store_id.is_none());
        assert_eq!(config.bind_addr.port(), 5000);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = load(&[("DB_MAX_CONNECTIONS", "many")]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for DB_MAX_CONNECTIONS");

        assert!(load(&[("RESERVATION_EXPIRY_DAYS", "0")]).is_err());
        assert!(load(&[("TIENDANUBE_PRICE_MARKUP_PERCENT", "-5")]).is_err());
        assert!(load(&[("SYNC_QUEUE_CAPACITY", "0")]).is_err());
    }
}
