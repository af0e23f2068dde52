//! Error types for the cache subsystem
//!
//! Storage failures are translated into [`CacheError`] at the adapter
//! boundary; callers never see raw `rusqlite` errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache subsystem.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Durable store could not be reached or rejected the operation
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Fingerprint could not be built or key is malformed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Invalid request data (value size, ttl, request body)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Cache miss surfaced over HTTP
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Upstream API fetch failed
    #[error("Upstream fetch failed: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::StorageUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Internal(format!("serialization: {}", e))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Upstream(_) => StatusCode::BAD_GATEWAY,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache subsystem.
pub type Result<T> = std::result::Result<T, CacheError>;
