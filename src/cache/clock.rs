//! Clock Module
//!
//! Source of "now" for expiry decisions. Timestamps are whole seconds so that
//! in-memory comparisons agree with what the durable store persists.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, SubsecRound, Utc};

// == Clock Trait ==
/// Provides the current time to the cache layers.
pub trait Clock: Send + Sync + Debug {
    /// Current time, truncated to whole seconds.
    fn now(&self) -> DateTime<Utc>;
}

// == System Clock ==
/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }
}

// == Manual Clock ==
/// Manually advanced clock for simulated-time scenarios.
#[derive(Debug)]
pub struct ManualClock {
    /// Unix seconds
    now: AtomicI64,
}

impl ManualClock {
    /// Starts the clock at the given instant.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: AtomicI64::new(start.timestamp()),
        }
    }

    /// Starts the clock at the current wall-clock second.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Moves the clock forward by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Jumps the clock to an absolute instant.
    pub fn set(&self, at: DateTime<Utc>) {
        self.now.store(at.timestamp(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        from_unix(self.now.load(Ordering::SeqCst))
    }
}

// == Utility Functions ==
/// Converts unix seconds to a UTC timestamp, clamping out-of-range values.
pub fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Adds a TTL in seconds to `now`.
pub fn expiry_after(now: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
    let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
    now.checked_add_signed(Duration::seconds(ttl.min(i64::MAX / 1000)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
