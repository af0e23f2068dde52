//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::cache::MAX_KEY_LENGTH;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: The serialized payload to store
/// - `ttl`: Optional TTL in seconds (uses default if not specified)
/// - `group`: Optional group (derived from the key prefix if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub group: Option<String>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LENGTH
            ));
        }
        if self.ttl == Some(0) {
            return Some("ttl must be positive".to_string());
        }
        None
    }
}

/// Query string for GET /stats
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    /// Recount occupancy from the durable store
    #[serde(default)]
    pub force: bool,
}
