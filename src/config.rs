//! Configuration Module
//!
//! Handles loading the table schema, TTL and retry settings, and server
//! parameters from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::RetryPolicy;

// == Key Schema ==
/// Names of the key attributes of the backing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Partition attribute name
    pub partition_key: String,
    /// Sort attribute name, None when the table has a simple primary key
    pub sort_key: Option<String>,
}

impl KeySchema {
    pub fn new(partition_key: impl Into<String>, sort_key: Option<&str>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.map(str::to_string),
        }
    }

    /// Attribute names making up the primary key, partition first.
    pub fn key_attributes(&self) -> Vec<String> {
        let mut names = vec![self.partition_key.clone()];
        names.extend(self.sort_key.iter().cloned());
        names
    }
}

impl Default for KeySchema {
    fn default() -> Self {
        Self::new("pk", Some("sk"))
    }
}

// == Store Configuration ==
/// Everything the cache needs to know about the table it writes to.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Table name
    pub table_name: String,
    /// Key attribute names
    pub schema: KeySchema,
    /// Attribute holding the expiry instant in Unix seconds
    pub expiration_attribute: String,
    /// TTL in milliseconds applied when a call does not pass one
    pub default_ttl_ms: u64,
    /// Backoff and attempt budget for batch chunks
    pub retry: RetryPolicy,
}

impl StoreConfig {
    /// Creates a StoreConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TABLE` - Table name (default: cache)
    /// - `CACHE_PARTITION_KEY` - Partition attribute (default: pk)
    /// - `CACHE_SORT_KEY` - Sort attribute, empty for none (default: sk)
    /// - `CACHE_EXPIRATION_ATTRIBUTE` - Expiry attribute (default: expiresAt)
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 60000)
    /// - `BATCH_MAX_ATTEMPTS` - Attempts per batch chunk (default: 10)
    /// - `BATCH_BASE_DELAY_MS` - First backoff delay (default: 50)
    /// - `BATCH_MAX_DELAY_MS` - Backoff ceiling (default: 2000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let sort_key = match env::var("CACHE_SORT_KEY") {
            Ok(name) if name.is_empty() => None,
            Ok(name) => Some(name),
            Err(_) => defaults.schema.sort_key.clone(),
        };

        Self {
            table_name: env::var("CACHE_TABLE").unwrap_or(defaults.table_name),
            schema: KeySchema {
                partition_key: env::var("CACHE_PARTITION_KEY")
                    .unwrap_or(defaults.schema.partition_key),
                sort_key,
            },
            expiration_attribute: env::var("CACHE_EXPIRATION_ATTRIBUTE")
                .unwrap_or(defaults.expiration_attribute),
            default_ttl_ms: parse_env("DEFAULT_TTL_MS", defaults.default_ttl_ms),
            retry: RetryPolicy {
                max_attempts: parse_env("BATCH_MAX_ATTEMPTS", defaults.retry.max_attempts),
                base_delay: Duration::from_millis(parse_env(
                    "BATCH_BASE_DELAY_MS",
                    defaults.retry.base_delay.as_millis() as u64,
                )),
                max_delay: Duration::from_millis(parse_env(
                    "BATCH_MAX_DELAY_MS",
                    defaults.retry.max_delay.as_millis() as u64,
                )),
            },
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: "cache".to_string(),
            schema: KeySchema::default(),
            expiration_attribute: "expiresAt".to_string(),
            default_ttl_ms: 60_000,
            retry: RetryPolicy::default(),
        }
    }
}

// == Server Configuration ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Table and cache settings
    pub store: StoreConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Interval in seconds between TTL sweeps of the in-memory table
    pub sweep_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - TTL sweep frequency in seconds (default: 5)
    /// - plus everything read by [`StoreConfig::from_env`]
    pub fn from_env() -> Self {
        Self {
            store: StoreConfig::from_env(),
            server_port: parse_env("SERVER_PORT", 3000),
            sweep_interval: parse_env("SWEEP_INTERVAL", 5),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            server_port: 3000,
            sweep_interval: 5,
        }
    }
}

fn parse_env<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.sweep_interval, 5);
        assert_eq!(config.store.table_name, "cache");
        assert_eq!(config.store.schema.partition_key, "pk");
        assert_eq!(config.store.schema.sort_key.as_deref(), Some("sk"));
        assert_eq!(config.store.expiration_attribute, "expiresAt");
        assert_eq!(config.store.default_ttl_ms, 60_000);
        assert_eq!(config.store.retry.max_attempts, 10);
    }

    #[test]
    fn test_key_attributes() {
        assert_eq!(KeySchema::default().key_attributes(), vec!["pk", "sk"]);
        assert_eq!(KeySchema::new("id", None).key_attributes(), vec!["id"]);
    }

    #[test]
    fn test_parse_env_fallback() {
        env::remove_var("DYNAMO_CACHE_TEST_UNSET");
        assert_eq!(parse_env("DYNAMO_CACHE_TEST_UNSET", 42u32), 42);

        env::set_var("DYNAMO_CACHE_TEST_GARBAGE", "not-a-number");
        assert_eq!(parse_env("DYNAMO_CACHE_TEST_GARBAGE", 7u64), 7);
        env::remove_var("DYNAMO_CACHE_TEST_GARBAGE");
    }
}
