//! LRU Tracker Module
//!
//! Access-order bookkeeping for fast layer eviction. Each touch stamps the
//! key with a monotonically increasing tick; the smallest tick is the least
//! recently used key.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
#[derive(Debug, Default)]
pub struct LruTracker {
    /// key -> last access tick
    ticks: HashMap<String, u64>,
    /// last access tick -> key, oldest first
    order: BTreeMap<u64, String>,
    next_tick: u64,
}

impl LruTracker {
    // == Touch ==
    /// Marks a key as most recently used.
    pub fn touch(&mut self, key: &str) {
        let tick = self.next_tick;
        self.next_tick += 1;

        if let Some(old) = self.ticks.insert(key.to_string(), tick) {
            self.order.remove(&old);
        }
        self.order.insert(tick, key.to_string());
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) {
        if let Some(tick) = self.ticks.remove(key) {
            self.order.remove(&tick);
        }
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

}

#[cfg(test)]
impl LruTracker {
    fn peek_oldest(&self) -> Option<&String> {
        self.order.values().next()
    }

    fn clear(&mut self) {
        self.ticks.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.ticks.len()
    }

    fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    fn contains(&self, key: &str) -> bool {
        self.ticks.contains_key(key)
    }
}
