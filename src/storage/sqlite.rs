//! SQLite Durable Store
//!
//! One table of cache rows keyed by fingerprint plus a small meta table that
//! holds the persisted stats snapshot. Timestamps are stored as unix seconds.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use crate::cache::clock::from_unix;
use crate::cache::{CacheEntry, CacheStats};
use crate::error::{CacheError, Result};
use crate::storage::DurableStore;

const STATS_SLOT: &str = "cache_stats";

/// How long a statement waits on another connection's write lock.
pub(crate) const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS api_cache (
        cache_key TEXT PRIMARY KEY,
        cache_value TEXT NOT NULL,
        cache_group TEXT NOT NULL,
        expires_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_api_cache_group ON api_cache(cache_group);
    CREATE INDEX IF NOT EXISTS idx_api_cache_expires ON api_cache(expires_at);
    CREATE TABLE IF NOT EXISTS cache_meta (
        name TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );
";

const SELECT_ENTRY: &str =
    "SELECT cache_key, cache_value, cache_group, expires_at, created_at FROM api_cache";

// == Connection Helpers ==
/// Opens a file-backed connection with WAL and a busy timeout, creating the
/// parent directory if needed.
pub(crate) fn open_file_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            CacheError::StorageUnavailable(format!("Failed to create data dir: {}", e))
        })?;
    }

    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!("SQLite journal mode for {}: {}", path.display(), mode);
    Ok(conn)
}

/// Runs `f` against the shared connection on the blocking pool.
///
/// Async callers only await the join handle, so a caller-side timeout stops
/// waiting even while the statement itself is stuck on a lock.
pub(crate) async fn with_conn<F, R>(conn: &Arc<Mutex<Connection>>, f: F) -> Result<R>
where
    F: FnOnce(&mut Connection) -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let mut guard = conn
            .lock()
            .map_err(|_| CacheError::StorageUnavailable("connection lock poisoned".to_string()))?;
        f(&mut guard)
    })
    .await
    .map_err(|e| CacheError::StorageUnavailable(format!("storage task failed: {}", e)))?
}

// == SQLite Store ==
/// Durable store backed by a single SQLite connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = open_file_connection(path)?;
        info!("Opened durable cache store at {}", path.display());
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    Ok(CacheEntry {
        key: row.get(0)?,
        value: row.get(1)?,
        group: row.get(2)?,
        expires_at: from_unix(row.get(3)?),
        created_at: from_unix(row.get(4)?),
    })
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn upsert(&self, entry: &CacheEntry) -> Result<Option<CacheEntry>> {
        let entry = entry.clone();
        with_conn(&self.conn, move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let previous = tx
                .query_row(
                    &format!("{} WHERE cache_key = ?1", SELECT_ENTRY),
                    params![entry.key],
                    row_to_entry,
                )
                .optional()?;

            tx.execute(
                "INSERT INTO api_cache (cache_key, cache_value, cache_group, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(cache_key) DO UPDATE SET
                    cache_value = excluded.cache_value,
                    cache_group = excluded.cache_group,
                    expires_at = excluded.expires_at,
                    created_at = excluded.created_at",
                params![
                    entry.key,
                    entry.value,
                    entry.group,
                    entry.expires_at.timestamp(),
                    entry.created_at.timestamp()
                ],
            )?;
            tx.commit()?;

            Ok(previous)
        })
        .await
    }

    async fn get_live(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let key = key.to_string();
        with_conn(&self.conn, move |conn| {
            let entry = conn
                .query_row(
                    &format!("{} WHERE cache_key = ?1 AND expires_at > ?2", SELECT_ENTRY),
                    params![key, now.timestamp()],
                    row_to_entry,
                )
                .optional()?;
            Ok(entry)
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<Option<CacheEntry>> {
        let key = key.to_string();
        with_conn(&self.conn, move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let previous = tx
                .query_row(
                    &format!("{} WHERE cache_key = ?1", SELECT_ENTRY),
                    params![key],
                    row_to_entry,
                )
                .optional()?;
            if previous.is_some() {
                tx.execute("DELETE FROM api_cache WHERE cache_key = ?1", params![key])?;
            }
            tx.commit()?;

            Ok(previous)
        })
        .await
    }

    async fn delete_group(&self, group: &str) -> Result<u64> {
        let group = group.to_string();
        with_conn(&self.conn, move |conn| {
            let removed =
                conn.execute("DELETE FROM api_cache WHERE cache_group = ?1", params![group])?;
            Ok(removed as u64)
        })
        .await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        with_conn(&self.conn, move |conn| {
            let removed = conn.execute(
                "DELETE FROM api_cache WHERE expires_at <= ?1",
                params![now.timestamp()],
            )?;
            Ok(removed as u64)
        })
        .await
    }

    async fn truncate(&self) -> Result<()> {
        with_conn(&self.conn, |conn| {
            conn.execute("DELETE FROM api_cache", [])?;
            Ok(())
        })
        .await
    }

    async fn count_all(&self) -> Result<u64> {
        with_conn(&self.conn, |conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM api_cache", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn count_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        with_conn(&self.conn, move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM api_cache WHERE expires_at <= ?1",
                params![now.timestamp()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn count_live_by_group(&self, now: DateTime<Utc>) -> Result<BTreeMap<String, u64>> {
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT cache_group, COUNT(*) FROM api_cache
                 WHERE expires_at > ?1 GROUP BY cache_group",
            )?;
            let rows = stmt.query_map(params![now.timestamp()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut groups = BTreeMap::new();
            for row in rows {
                let (group, count) = row?;
                groups.insert(group, count as u64);
            }
            Ok(groups)
        })
        .await
    }

    async fn load_stats(&self) -> Result<Option<CacheStats>> {
        let raw = with_conn(&self.conn, |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM cache_meta WHERE name = ?1",
                    params![STATS_SLOT],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(raw)
        })
        .await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save_stats(&self, stats: &CacheStats) -> Result<()> {
        let json = serde_json::to_string(stats)?;
        with_conn(&self.conn, move |conn| {
            conn.execute(
                "INSERT INTO cache_meta (name, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![STATS_SLOT, json, Utc::now().timestamp()],
            )?;
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        with_conn(&self.conn, |conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}
