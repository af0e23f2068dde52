//! Response DTOs for the admin API
//!
//! Stats and health are served as `CacheStats` and `HealthReport` directly.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Response body for GET /get/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: String,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for PUT /set
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    pub message: String,
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for DELETE /del/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub key: String,
    /// Whether a stored entry existed
    pub deleted: bool,
}

/// Response body for DELETE /groups/:group
#[derive(Debug, Clone, Serialize)]
pub struct GroupDeleteResponse {
    pub group: String,
    /// Durable rows removed
    pub deleted: u64,
}

/// Response body for operator actions (flush, maintenance)
#[derive(Debug, Clone, Serialize)]
pub struct OperationResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<u64>,
    pub timestamp: String,
}

impl OperationResponse {
    pub fn new(message: impl Into<String>, deleted: Option<u64>, at: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            deleted,
            timestamp: at.to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
