//! Fast Layer Module
//!
//! Optional ephemeral cache in front of the durable store. Its presence is a
//! startup decision; any failure here only costs performance.

mod lru;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use lru::LruTracker;
pub use memory::MemoryFastLayer;

// == Fast Layer Error ==
/// Failures of the fast layer. Never surfaced to cache callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FastLayerError {
    /// Backend could not be reached
    #[error("Fast layer unavailable: {0}")]
    Unavailable(String),

    /// Backend cannot perform this operation
    #[error("Fast layer does not support {0}")]
    Unsupported(&'static str),
}

// == Fast Layer Trait ==
/// Ephemeral key-value cache with per-key TTL.
#[async_trait]
pub trait FastLayer: Send + Sync {
    /// Short backend name for logs and health messages.
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<String>, FastLayerError>;

    async fn set(
        &self,
        key: &str,
        value: &str,
        group: &str,
        ttl_seconds: u64,
    ) -> Result<(), FastLayerError>;

    async fn delete(&self, key: &str) -> Result<(), FastLayerError>;

    /// Drops every key in this layer's namespace.
    async fn flush(&self) -> Result<(), FastLayerError>;

    /// Drops every key tagged with `group`. Backends without bulk delete
    /// leave those keys to expire.
    async fn invalidate_group(&self, _group: &str) -> Result<usize, FastLayerError> {
        Err(FastLayerError::Unsupported("group invalidation"))
    }

    /// Drops expired keys for backends that do not expire them on their own.
    async fn purge_expired(&self) -> Result<usize, FastLayerError> {
        Ok(0)
    }

    async fn ping(&self) -> Result<(), FastLayerError>;
}
