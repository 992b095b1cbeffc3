//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Signing secret used when `JWT_SECRET` is not set. Development only.
const DEV_JWT_SECRET: &str = "bookstore-dev-secret";

const DEFAULT_GATEWAY_URL: &str = "https://api.xendit.co";

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset selects the in-memory store
/// - `JWT_SECRET`: HS256 secret for bearer tokens
/// - `PAYMENT_GATEWAY_URL`: invoice API base URL (default: `"https://api.xendit.co"`)
/// - `PAYMENT_GATEWAY_SECRET_KEY`: invoice API key; unset selects the in-memory gateway
/// - `PAYMENT_GATEWAY_TIMEOUT_SECS`: bound on gateway calls (default: `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub gateway_url: String,
    pub gateway_secret_key: Option<String>,
    pub gateway_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            jwt_secret: non_empty("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            gateway_url: non_empty("PAYMENT_GATEWAY_URL").unwrap_or(defaults.gateway_url),
            gateway_secret_key: non_empty("PAYMENT_GATEWAY_SECRET_KEY"),
            gateway_timeout: non_empty("PAYMENT_GATEWAY_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.gateway_timeout),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether the development JWT secret is in use.
    pub fn uses_dev_jwt_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            gateway_secret_key: None,
            gateway_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert!(config.gateway_secret_key.is_none());
        assert_eq!(config.gateway_url, "https://api.xendit.co");
        assert_eq!(config.gateway_timeout, Duration::from_secs(10));
        assert!(config.uses_dev_jwt_secret());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_lookup_overrides_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8081"),
            ("DATABASE_URL", "postgres://localhost/bookstore"),
            ("JWT_SECRET", "s3cret"),
            ("PAYMENT_GATEWAY_SECRET_KEY", "xnd_development_key"),
            ("PAYMENT_GATEWAY_TIMEOUT_SECS", "3"),
        ]));

        assert_eq!(config.port, 8081);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/bookstore")
        );
        assert_eq!(config.jwt_secret, "s3cret");
        assert!(!config.uses_dev_jwt_secret());
        assert_eq!(
            config.gateway_secret_key.as_deref(),
            Some("xnd_development_key")
        );
        assert_eq!(config.gateway_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_and_empty_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("DATABASE_URL", "   "),
            ("PAYMENT_GATEWAY_TIMEOUT_SECS", "soon"),
        ]));

        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.gateway_timeout, Duration::from_secs(10));
    }
}
