//! Cache Manager
//!
//! Orchestrates lookups and writes across the optional fast layer and the
//! authoritative durable store, and keeps the stats snapshot current.
//!
//! Failure policy:
//! - durable store errors on `get` are reported as misses
//! - durable store errors on writes and maintenance are returned to the caller
//! - fast layer errors are logged and the layer is bypassed

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::clock::Clock;
use crate::cache::fingerprint::{group_of, validate_key};
use crate::cache::health::{HealthReport, HealthStatus};
use crate::cache::{CacheEntry, CacheStats, MAX_VALUE_SIZE};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::fast::{FastLayer, FastLayerError};
use crate::storage::DurableStore;

// == Cache Policy ==
/// Tunables the manager needs from configuration.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// TTL used when callers do not pick one
    pub default_ttl: u64,
    /// Seconds before `get_stats` recounts occupancy
    pub stats_max_age: u64,
    /// Entry count at which health turns to warning
    pub entry_warning_threshold: u64,
    /// Bound on each health probe
    pub health_probe_timeout: Duration,
    /// Expected seconds between maintenance runs
    pub maintenance_interval: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CachePolicy {
    fn from(config: &Config) -> Self {
        Self {
            default_ttl: config.default_ttl,
            stats_max_age: config.stats_max_age,
            entry_warning_threshold: config.entry_warning_threshold,
            health_probe_timeout: Duration::from_millis(config.health_probe_timeout_ms),
            maintenance_interval: config.maintenance_interval,
        }
    }
}

// == Cache Manager ==
pub struct CacheManager {
    store: Arc<dyn DurableStore>,
    fast: Option<Arc<dyn FastLayer>>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
    stats: RwLock<CacheStats>,
}

impl CacheManager {
    // == Constructor ==
    /// Creates a manager, resuming from the persisted stats snapshot if any.
    pub async fn open(
        store: Arc<dyn DurableStore>,
        fast: Option<Arc<dyn FastLayer>>,
        clock: Arc<dyn Clock>,
        policy: CachePolicy,
    ) -> Self {
        let stats = match store.load_stats().await {
            Ok(Some(stats)) => {
                info!(
                    "Resumed cache stats: hits={}, misses={}",
                    stats.hits, stats.misses
                );
                stats
            }
            Ok(None) => CacheStats::new(),
            Err(e) => {
                warn!("Could not load persisted cache stats, starting from zero: {}", e);
                CacheStats::new()
            }
        };

        match &fast {
            Some(layer) => info!("Cache manager using '{}' fast layer", layer.name()),
            None => info!("Cache manager running without a fast layer"),
        }

        Self {
            store,
            fast,
            clock,
            policy,
            stats: RwLock::new(stats),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn object_cache_enabled(&self) -> bool {
        self.fast.is_some()
    }

    // == Get ==
    /// Looks up `key`. A miss is `Ok(None)`; only a malformed key is an error.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;

        if let Some(fast) = &self.fast {
            match fast.get(key).await {
                Ok(Some(value)) => {
                    self.stats.write().await.record_hit();
                    debug!("Fast layer hit: {}", key);
                    return Ok(Some(value));
                }
                Ok(None) => {}
                Err(e) => debug!("Bypassing fast layer for {}: {}", key, e),
            }
        }

        let now = self.clock.now();
        match self.store.get_live(key, now).await {
            Ok(Some(entry)) => {
                self.backfill(&entry, now).await;
                self.stats.write().await.record_hit();
                debug!("Durable store hit: {}", key);
                Ok(Some(entry.value))
            }
            Ok(None) => {
                self.stats.write().await.record_miss();
                debug!("Cache miss: {}", key);
                Ok(None)
            }
            Err(e) => {
                warn!("Durable store read failed for {}, treating as miss: {}", key, e);
                self.stats.write().await.record_miss();
                Ok(None)
            }
        }
    }

    async fn backfill(&self, entry: &CacheEntry, now: DateTime<Utc>) {
        let Some(fast) = &self.fast else {
            return;
        };
        let ttl = entry.ttl_remaining_at(now);
        if ttl == 0 {
            return;
        }
        if let Err(e) = fast.set(&entry.key, &entry.value, &entry.group, ttl).await {
            debug!("Fast layer back-fill skipped for {}: {}", entry.key, e);
        }
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl_seconds`.
    ///
    /// An empty `group` is derived from the key prefix. Fails when the
    /// durable write does not persist.
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: u64, group: &str) -> Result<()> {
        validate_key(key)?;
        if ttl_seconds == 0 {
            return Err(CacheError::InvalidRequest("ttl must be positive".to_string()));
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        let group = if group.is_empty() { group_of(key) } else { group };
        let now = self.clock.now();
        let entry = CacheEntry::new(key, value, group, ttl_seconds, now);

        let previous = self.store.upsert(&entry).await.map_err(|e| {
            warn!("Cache write for {} did not persist: {}", key, e);
            e
        })?;

        if let Some(fast) = &self.fast {
            if let Err(e) = fast.set(key, value, group, ttl_seconds).await {
                debug!("Fast layer write skipped for {}: {}", key, e);
            }
        }

        let mut stats = self.stats.write().await;
        match previous {
            None => {
                stats.total_entries += 1;
                stats.add_to_group(group);
            }
            // Expired rows are not tracked per group; recount on next read
            Some(prev) if prev.is_expired_at(now) => stats.mark_stale(),
            Some(prev) if prev.group != group => {
                stats.remove_from_group(&prev.group);
                stats.add_to_group(group);
            }
            Some(_) => {}
        }

        Ok(())
    }

    // == Delete ==
    /// Removes `key` from both layers. Returns whether a durable row existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;

        let removed = self.store.delete(key).await?;
        if let Some(fast) = &self.fast {
            if let Err(e) = fast.delete(key).await {
                debug!("Fast layer delete skipped for {}: {}", key, e);
            }
        }

        if let Some(prev) = &removed {
            let now = self.clock.now();
            let mut stats = self.stats.write().await;
            stats.total_entries = stats.total_entries.saturating_sub(1);
            if prev.is_expired_at(now) {
                stats.mark_stale();
            } else {
                stats.remove_from_group(&prev.group);
            }
        }

        Ok(removed.is_some())
    }

    // == Delete Group ==
    /// Removes every durable row in `group`, returning how many were removed.
    pub async fn delete_group(&self, group: &str) -> Result<u64> {
        if group.is_empty() {
            return Err(CacheError::InvalidRequest("Group cannot be empty".to_string()));
        }

        let removed = self.store.delete_group(group).await?;

        if let Some(fast) = &self.fast {
            match fast.invalidate_group(group).await {
                Ok(count) => debug!("Fast layer dropped {} keys of group {}", count, group),
                Err(FastLayerError::Unsupported(_)) => {
                    debug!("Fast layer keys of group {} left to expire", group)
                }
                Err(e) => warn!("Fast layer group invalidation failed for {}: {}", group, e),
            }
        }

        {
            let mut stats = self.stats.write().await;
            stats.total_entries = stats.total_entries.saturating_sub(removed);
            stats.clear_group(group);
        }

        info!("Deleted {} cache entries from group {}", removed, group);
        Ok(removed)
    }

    // == Flush All ==
    /// Empties both layers. Hit/miss history is kept.
    pub async fn flush_all(&self) -> Result<()> {
        self.store.truncate().await?;

        if let Some(fast) = &self.fast {
            if let Err(e) = fast.flush().await {
                warn!("Fast layer flush failed: {}", e);
            }
        }

        let now = self.clock.now();
        let snapshot = {
            let mut stats = self.stats.write().await;
            stats.reset_occupancy(now);
            stats.clone()
        };
        if let Err(e) = self.store.save_stats(&snapshot).await {
            warn!("Could not persist cache stats after flush: {}", e);
        }

        info!("Cache flushed");
        Ok(())
    }

    // == Stats ==
    /// Returns the stats snapshot, recounting occupancy when forced or stale.
    pub async fn get_stats(&self, force_refresh: bool) -> Result<CacheStats> {
        let now = self.clock.now();
        let stale = self
            .stats
            .read()
            .await
            .is_stale(now, self.policy.stats_max_age);

        if force_refresh || stale {
            return self.refresh_occupancy(now).await;
        }

        let mut snapshot = self.stats.read().await.clone();
        snapshot.hit_ratio = snapshot.compute_hit_ratio();
        Ok(snapshot)
    }

    async fn refresh_occupancy(&self, now: DateTime<Utc>) -> Result<CacheStats> {
        let total = self.store.count_all().await?;
        let expired = self.store.count_expired(now).await?;
        let groups = self.store.count_live_by_group(now).await?;

        let snapshot = {
            let mut stats = self.stats.write().await;
            stats.apply_occupancy(total, expired, groups, now);
            stats.hit_ratio = stats.compute_hit_ratio();
            stats.clone()
        };
        self.store.save_stats(&snapshot).await?;

        debug!(
            "Cache stats refreshed: total={}, expired={}",
            snapshot.total_entries, snapshot.expired_entries
        );
        Ok(snapshot)
    }

    /// Writes the current snapshot to the durable store.
    pub async fn persist_stats(&self) -> Result<()> {
        let snapshot = self.stats.read().await.clone();
        self.store.save_stats(&snapshot).await
    }

    // == Maintenance ==
    /// Deletes expired rows and returns how many were removed.
    ///
    /// Safe alongside normal traffic: a row removed mid-read becomes a miss.
    pub async fn maintenance(&self) -> Result<u64> {
        let now = self.clock.now();
        let deleted = self.store.delete_expired(now).await?;

        if let Some(fast) = &self.fast {
            match fast.purge_expired().await {
                Ok(0) => {}
                Ok(count) => debug!("Fast layer purged {} expired keys", count),
                Err(e) => debug!("Fast layer purge skipped: {}", e),
            }
        }

        self.stats.write().await.last_cleanup = Some(now);
        if let Err(e) = self.refresh_occupancy(now).await {
            warn!("Stats refresh after maintenance failed: {}", e);
            self.stats.write().await.mark_stale();
        }

        info!("Cache maintenance removed {} expired entries", deleted);
        Ok(deleted)
    }

    // == Health ==
    /// Probes both layers, each bounded by the configured timeout.
    pub async fn check_health(&self) -> HealthReport {
        let mut report = HealthReport::new(self.fast.is_some());
        let limit = self.policy.health_probe_timeout;
        let now = self.clock.now();

        match timeout(limit, self.store.count_all()).await {
            Ok(Ok(total)) => {
                report.total_entries = Some(total);
                let threshold = self.policy.entry_warning_threshold;
                if total >= threshold {
                    report.escalate(
                        HealthStatus::Warning,
                        format!(
                            "Cache table holds {} entries (warning threshold {})",
                            total, threshold
                        ),
                    );
                }
                self.check_maintenance_lag(&mut report, now, limit).await;
            }
            Ok(Err(e)) => {
                report.escalate(HealthStatus::Error, format!("Durable store unreachable: {}", e));
            }
            Err(_) => {
                report.escalate(
                    HealthStatus::Error,
                    format!("Durable store did not respond within {} ms", limit.as_millis()),
                );
            }
        }

        if let Some(fast) = &self.fast {
            match timeout(limit, fast.ping()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => report.escalate(
                    HealthStatus::Warning,
                    format!("Object cache '{}' configured but unreachable: {}", fast.name(), e),
                ),
                Err(_) => report.escalate(
                    HealthStatus::Warning,
                    format!(
                        "Object cache '{}' did not respond within {} ms",
                        fast.name(),
                        limit.as_millis()
                    ),
                ),
            }
        }

        if report.messages.is_empty() {
            report.messages.push("Cache is operating normally".to_string());
        }
        report
    }

    async fn check_maintenance_lag(
        &self,
        report: &mut HealthReport,
        now: DateTime<Utc>,
        limit: Duration,
    ) {
        let Some(last_cleanup) = self.stats.read().await.last_cleanup else {
            return;
        };
        let overdue_after = self.policy.maintenance_interval.saturating_mul(2) as i64;
        if (now - last_cleanup).num_seconds() <= overdue_after {
            return;
        }

        if let Ok(Ok(expired)) = timeout(limit, self.store.count_expired(now)).await {
            if expired > 0 {
                report.escalate(
                    HealthStatus::Warning,
                    format!(
                        "{} expired entries awaiting cleanup; maintenance last ran {}",
                        expired,
                        last_cleanup.to_rfc3339()
                    ),
                );
            }
        }
    }
}
