//! Durable Store Module
//!
//! Authoritative persistence for cache entries and the stats snapshot.

pub(crate) mod sqlite;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cache::{CacheEntry, CacheStats};
use crate::error::Result;

pub use sqlite::SqliteStore;

// == Durable Store Trait ==
/// Persistent key-value table with expiry timestamps.
///
/// Every failure is reported as `CacheError::StorageUnavailable`.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Inserts or overwrites `entry`, returning the row it replaced.
    async fn upsert(&self, entry: &CacheEntry) -> Result<Option<CacheEntry>>;

    /// Returns the row for `key` if it has not expired at `now`.
    async fn get_live(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>>;

    /// Removes the row for `key`, returning it if it existed.
    async fn delete(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Removes every row in `group`, returning how many were removed.
    async fn delete_group(&self, group: &str) -> Result<u64>;

    /// Removes every row with `expires_at <= now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Removes every row.
    async fn truncate(&self) -> Result<()>;

    /// Number of rows, expired or not.
    async fn count_all(&self) -> Result<u64>;

    /// Number of rows with `expires_at <= now`.
    async fn count_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Live row count per group.
    async fn count_live_by_group(&self, now: DateTime<Utc>) -> Result<BTreeMap<String, u64>>;

    /// Reads the persisted stats snapshot.
    async fn load_stats(&self) -> Result<Option<CacheStats>>;

    /// Persists the stats snapshot.
    async fn save_stats(&self, stats: &CacheStats) -> Result<()>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<()>;
}
