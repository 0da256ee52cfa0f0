//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: Cache key, `"<partition>+<sort>"`
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in milliseconds (uses default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        None
    }
}

/// Request body listing keys (POST /mget, POST /mdel)
#[derive(Debug, Clone, Deserialize)]
pub struct KeysRequest {
    pub keys: Vec<String>,
}

/// Request body for the multi-set operation (PUT /mset)
///
/// Entries are `[key, value]` pairs sharing a single TTL in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct MsetRequest {
    pub entries: Vec<(String, Value)>,
    #[serde(default)]
    pub ttl: Option<u64>,
}

/// Request body for the touch operation (POST /touch)
#[derive(Debug, Clone, Deserialize)]
pub struct TouchRequest {
    pub key: String,
    #[serde(default)]
    pub ttl: Option<u64>,
}

/// Query string for GET /keys
///
/// Note that `+` must be sent as `%2B` in a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysQuery {
    pub pattern: Option<String>,
}
