//! Cache Statistics Module
//!
//! Process-wide hit/miss counters and occupancy snapshot. Persisted as JSON
//! in the durable store's meta slot.
//!
//! Counters are exact within one process. Several processes sharing one
//! database each persist their own snapshot, so the stored counters may
//! undercount under concurrent writers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Cache Stats ==
/// Cache performance and occupancy metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Successful lookups since the counters were created
    pub hits: u64,
    /// Lookups that fell through to the upstream API
    pub misses: u64,
    /// Rows physically present in the durable store
    pub total_entries: u64,
    /// Rows past expiry that maintenance has not swept yet
    #[serde(default)]
    pub expired_entries: u64,
    /// hits / (hits + misses)
    #[serde(default)]
    pub hit_ratio: f64,
    /// Last completed maintenance run
    pub last_cleanup: Option<DateTime<Utc>>,
    /// When occupancy figures were last recomputed from the store
    #[serde(default)]
    pub last_refreshed: Option<DateTime<Utc>>,
    /// Live entries per group
    #[serde(default)]
    pub groups: BTreeMap<String, u64>,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn compute_hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
        self.hit_ratio = self.compute_hit_ratio();
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
        self.hit_ratio = self.compute_hit_ratio();
    }

    // == Group Accounting ==
    /// Counts a new live entry in `group`.
    pub fn add_to_group(&mut self, group: &str) {
        *self.groups.entry(group.to_string()).or_insert(0) += 1;
    }

    /// Removes a live entry from `group`, never going below zero.
    pub fn remove_from_group(&mut self, group: &str) {
        if let Some(count) = self.groups.get_mut(group) {
            *count = count.saturating_sub(1);
        }
    }

    /// Marks a group as emptied while keeping it listed.
    pub fn clear_group(&mut self, group: &str) {
        self.groups.insert(group.to_string(), 0);
    }

    /// Replaces occupancy figures with freshly counted ones.
    ///
    /// Groups that no longer have rows stay listed with a zero count.
    pub fn apply_occupancy(
        &mut self,
        total_entries: u64,
        expired_entries: u64,
        live_groups: BTreeMap<String, u64>,
        at: DateTime<Utc>,
    ) {
        self.total_entries = total_entries;
        self.expired_entries = expired_entries;
        for count in self.groups.values_mut() {
            *count = 0;
        }
        self.groups.extend(live_groups);
        self.last_refreshed = Some(at);
    }

    /// Clears occupancy after a flush. Hit/miss history is kept.
    pub fn reset_occupancy(&mut self, at: DateTime<Utc>) {
        self.total_entries = 0;
        self.expired_entries = 0;
        self.groups.clear();
        self.last_refreshed = Some(at);
    }

    /// Forces the next stats read to recount occupancy.
    pub fn mark_stale(&mut self) {
        self.last_refreshed = None;
    }

    /// Whether the occupancy snapshot is older than `max_age_secs`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_secs: u64) -> bool {
        match self.last_refreshed {
            Some(at) => (now - at).num_seconds() >= max_age_secs as i64,
            None => true,
        }
    }
}
