//! Cache Entry Module
//!
//! Defines the typed row stored in the durable store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::clock::expiry_after;

// == Cache Entry ==
/// A cached upstream response with its namespace and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request fingerprint
    pub key: String,
    /// Serialized payload, opaque to the cache
    pub value: String,
    /// Eviction namespace
    pub group: String,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
    /// Creation time of this version of the row
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry that expires `ttl_seconds` after `now`.
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        group: impl Into<String>,
        ttl_seconds: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            group: group.into(),
            expires_at: expiry_after(now, ttl_seconds),
            created_at: now,
        }
    }

    // == Is Expired ==
    /// An entry is expired once `now >= expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    // == Time To Live ==
    /// Remaining lifetime in whole seconds, zero once expired.
    pub fn ttl_remaining_at(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}
