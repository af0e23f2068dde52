//! Search Log
//!
//! Audit trail of searches and a sliding-window rate limit per identity
//! (user id or client IP). Lives in the same SQLite file as the cache but
//! never reads cache statistics.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::clock::{from_unix, Clock};
use crate::error::Result;
use crate::storage::sqlite::{open_file_connection, with_conn};

/// Length of the rate-limit window.
pub const RATE_WINDOW_SECS: i64 = 3600;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS search_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity TEXT NOT NULL,
        query TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_search_log_identity
        ON search_log(identity, created_at);
";

/// One recorded search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRecord {
    pub identity: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Searches by this identity inside the window
    pub count: u64,
    pub limit: u64,
}

// == Search Log ==
#[derive(Debug, Clone)]
pub struct SearchLog {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
    limit_per_hour: u64,
}

impl SearchLog {
    /// Opens the log in the database file at `path`, which may be shared
    /// with the durable cache store.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>, limit_per_hour: u64) -> Result<Self> {
        let path = path.as_ref();
        let log = Self::with_connection(open_file_connection(path)?, clock, limit_per_hour)?;
        info!(
            "Opened search log at {} (limit {} searches/hour)",
            path.display(),
            limit_per_hour
        );
        Ok(log)
    }

    pub fn open_in_memory(clock: Arc<dyn Clock>, limit_per_hour: u64) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, clock, limit_per_hour)
    }

    fn with_connection(conn: Connection, clock: Arc<dyn Clock>, limit_per_hour: u64) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock,
            limit_per_hour,
        })
    }

    pub fn limit_per_hour(&self) -> u64 {
        self.limit_per_hour
    }

    /// Appends an audit row for a search.
    pub async fn record(&self, identity: &str, query: &str) -> Result<()> {
        let now = self.clock.now();
        let (who, query) = (identity.to_string(), query.to_string());
        with_conn(&self.conn, move |conn| {
            conn.execute(
                "INSERT INTO search_log (identity, query, created_at) VALUES (?1, ?2, ?3)",
                params![who, query, now.timestamp()],
            )?;
            Ok(())
        })
        .await?;
        debug!("Recorded search by {}", identity);
        Ok(())
    }

    /// Searches by `identity` within the last `window_secs`.
    pub async fn count_recent(&self, identity: &str, window_secs: i64) -> Result<u64> {
        let since = self.clock.now() - Duration::seconds(window_secs);
        let identity = identity.to_string();
        with_conn(&self.conn, move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM search_log WHERE identity = ?1 AND created_at > ?2",
                params![identity, since.timestamp()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    /// Whether `identity` may search again within the hourly limit.
    pub async fn check_rate_limit(&self, identity: &str) -> Result<RateLimitDecision> {
        let count = self.count_recent(identity, RATE_WINDOW_SECS).await?;
        Ok(RateLimitDecision {
            allowed: count < self.limit_per_hour,
            count,
            limit: self.limit_per_hour,
        })
    }

    /// Most recent searches, newest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<SearchRecord>> {
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT identity, query, created_at FROM search_log
                 ORDER BY created_at DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(SearchRecord {
                    identity: row.get(0)?,
                    query: row.get(1)?,
                    created_at: from_unix(row.get(2)?),
                })
            })?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
    }

    /// Drops audit rows older than `age_secs`.
    pub async fn purge_older_than(&self, age_secs: i64) -> Result<u64> {
        let cutoff = self.clock.now() - Duration::seconds(age_secs);
        with_conn(&self.conn, move |conn| {
            let removed = conn.execute(
                "DELETE FROM search_log WHERE created_at <= ?1",
                params![cutoff.timestamp()],
            )?;
            Ok(removed as u64)
        })
        .await
    }
}
