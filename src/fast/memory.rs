//! In-Process Fast Layer
//!
//! Bounded HashMap with TTL expiry and LRU eviction, shared by every request
//! handled by this process. Several layers can share one backing map under
//! different namespaces (see [`MemoryFastLayer::sharing`]); flush and group
//! invalidation only touch the caller's own namespace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::clock::{expiry_after, Clock};
use crate::fast::{FastLayer, FastLayerError, LruTracker};

#[derive(Debug, Clone)]
struct FastEntry {
    value: String,
    group: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Slots {
    entries: HashMap<String, FastEntry>,
    lru: LruTracker,
}

impl Slots {
    fn remove(&mut self, key: &str) -> Option<FastEntry> {
        self.lru.remove(key);
        self.entries.remove(key)
    }

    fn remove_where(&mut self, predicate: impl Fn(&str, &FastEntry) -> bool) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, entry)| predicate(key, entry))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }
}

// == Memory Fast Layer ==
#[derive(Debug, Clone)]
pub struct MemoryFastLayer {
    slots: Arc<RwLock<Slots>>,
    namespace: String,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl MemoryFastLayer {
    /// Creates a layer holding at most `max_entries` keys under `namespace`.
    pub fn new(namespace: impl Into<String>, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Arc::new(RwLock::new(Slots::default())),
            namespace: namespace.into(),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    /// Another layer over the same backing map and capacity, under `namespace`.
    pub fn sharing(&self, namespace: impl Into<String>) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            namespace: namespace.into(),
            max_entries: self.max_entries,
            clock: Arc::clone(&self.clock),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Number of keys currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.slots.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl FastLayer for MemoryFastLayer {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, FastLayerError> {
        let key = self.namespaced(key);
        let now = self.clock.now();
        let mut slots = self.slots.write().await;

        let Some(entry) = slots.entries.get(&key) else {
            return Ok(None);
        };
        if now >= entry.expires_at {
            slots.remove(&key);
            return Ok(None);
        }

        let value = entry.value.clone();
        slots.lru.touch(&key);
        Ok(Some(value))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        group: &str,
        ttl_seconds: u64,
    ) -> Result<(), FastLayerError> {
        let key = self.namespaced(key);
        let expires_at = expiry_after(self.clock.now(), ttl_seconds);
        let mut slots = self.slots.write().await;

        if !slots.entries.contains_key(&key) && slots.entries.len() >= self.max_entries {
            if let Some(evicted) = slots.lru.evict_oldest() {
                slots.entries.remove(&evicted);
                debug!("Fast layer evicted {}", evicted);
            }
        }

        slots.entries.insert(
            key.clone(),
            FastEntry {
                value: value.to_string(),
                group: group.to_string(),
                expires_at,
            },
        );
        slots.lru.touch(&key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), FastLayerError> {
        let key = self.namespaced(key);
        self.slots.write().await.remove(&key);
        Ok(())
    }

    async fn flush(&self) -> Result<(), FastLayerError> {
        let namespace = self.namespace.as_str();
        let mut slots = self.slots.write().await;
        let removed = slots.remove_where(|key, _| key.starts_with(namespace));
        debug!("Fast layer flushed {} keys", removed);
        Ok(())
    }

    async fn invalidate_group(&self, group: &str) -> Result<usize, FastLayerError> {
        let namespace = self.namespace.as_str();
        let mut slots = self.slots.write().await;
        Ok(slots.remove_where(|key, entry| key.starts_with(namespace) && entry.group == group))
    }

    async fn purge_expired(&self) -> Result<usize, FastLayerError> {
        let now = self.clock.now();
        let mut slots = self.slots.write().await;
        Ok(slots.remove_where(|_, entry| now >= entry.expires_at))
    }

    async fn ping(&self) -> Result<(), FastLayerError> {
        Ok(())
    }
}
