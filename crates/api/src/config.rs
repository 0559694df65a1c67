//! Application configuration loaded from environment variables.

use std::time::Duration;

use checkout::{CheckoutConfig, RetryPolicy};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` (default: `"0.0.0.0"`) and `PORT` (default: `3000`)
/// - `RUST_LOG` tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` `text` or `json` (default: `text`)
/// - `DATABASE_URL` PostgreSQL connection string; unset runs in memory
/// - `DEFAULT_TENANT_ID` tenant used when a request has no `x-tenant-id`
/// - `FRAUD_API_URL`, `FRAUD_API_KEY`, `FRAUD_TIMEOUT_SECS` (default: `10`)
/// - `CONVERSION_ENDPOINT` server-side conversion tracking endpoint
/// - `SECRET_KEY` key material for stored email credentials
/// - `TASK_QUEUE_CAPACITY` (default: `1024`), `TASK_MAX_RETRIES` (default: `3`)
/// - `STORE_NAME` shown in customer emails
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub default_tenant: Option<String>,
    pub fraud_api_url: Option<String>,
    pub fraud_api_key: Option<String>,
    pub fraud_timeout_secs: u64,
    pub conversion_endpoint: Option<String>,
    pub secret_key: String,
    pub task_queue_capacity: usize,
    pub task_max_retries: usize,
    pub store_name: String,
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
        fn parse<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
            value.and_then(|v| v.trim().parse().ok())
        }
        let parsed_u16 = |key: &str| parse::<u16>(non_empty(key));
        let parsed_u64 = |key: &str| parse::<u64>(non_empty(key));
        let parsed_usize = |key: &str| parse::<usize>(non_empty(key));

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parsed_u16("PORT").unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match non_empty("LOG_FORMAT") {
                Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: non_empty("DATABASE_URL"),
            default_tenant: non_empty("DEFAULT_TENANT_ID"),
            fraud_api_url: non_empty("FRAUD_API_URL"),
            fraud_api_key: non_empty("FRAUD_API_KEY"),
            fraud_timeout_secs: parsed_u64("FRAUD_TIMEOUT_SECS").unwrap_or(defaults.fraud_timeout_secs),
            conversion_endpoint: non_empty("CONVERSION_ENDPOINT"),
            secret_key: non_empty("SECRET_KEY").unwrap_or(defaults.secret_key),
            task_queue_capacity: parsed_usize("TASK_QUEUE_CAPACITY")
                .filter(|c| *c > 0)
                .unwrap_or(defaults.task_queue_capacity),
            task_max_retries: parsed_usize("TASK_MAX_RETRIES").unwrap_or(defaults.task_max_retries),
            store_name: non_empty("STORE_NAME").unwrap_or(defaults.store_name),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Pipeline knobs derived from this configuration.
    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig {
            fraud_timeout: Duration::from_secs(self.fraud_timeout_secs),
            queue_capacity: self.task_queue_capacity,
            retry: RetryPolicy {
                max_retries: self.task_max_retries,
                ..RetryPolicy::default()
            },
            store_name: self.store_name.clone(),
            ..CheckoutConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let checkout = CheckoutConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            default_tenant: None,
            fraud_api_url: None,
            fraud_api_key: None,
            fraud_timeout_secs: checkout.fraud_timeout.as_secs(),
            conversion_endpoint: None,
            secret_key: "development-secret-key".to_string(),
            task_queue_capacity: checkout.queue_capacity,
            task_max_retries: checkout.retry.max_retries,
            store_name: checkout.store_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.fraud_timeout_secs, 10);
        assert_eq!(config.task_queue_capacity, 1024);
        assert_eq!(config.task_max_retries, 3);
        assert!(config.database_url.is_none());
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
    fn test_reads_overrides() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("DEFAULT_TENANT_ID", "shop-1"),
            ("FRAUD_API_URL", "https://fraud.example.com/check"),
            ("FRAUD_TIMEOUT_SECS", "3"),
            ("TASK_MAX_RETRIES", "5"),
        ]);
        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/shop"));
        assert_eq!(config.default_tenant.as_deref(), Some("shop-1"));
        assert_eq!(config.fraud_timeout_secs, 3);
        assert_eq!(config.task_max_retries, 5);
    }

    #[test]
    fn test_invalid_and_blank_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("DATABASE_URL", "  "),
            ("TASK_QUEUE_CAPACITY", "0"),
        ]);
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.task_queue_capacity, 1024);
    }

    #[test]
    fn test_checkout_config() {
        let config = from_pairs(&[("FRAUD_TIMEOUT_SECS", "4"), ("TASK_MAX_RETRIES", "1")]);
        let checkout = config.checkout_config();
        assert_eq!(checkout.fraud_timeout, Duration::from_secs(4));
        assert_eq!(checkout.retry.max_retries, 1);
        assert_eq!(checkout.affiliate_cookie, "affiliate_ref");
    }
}
