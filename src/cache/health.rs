//! Health Report Module

use serde::{Deserialize, Serialize};

/// Overall cache health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Error,
}

/// Read-only diagnostic produced by `CacheManager::check_health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub messages: Vec<String>,
    /// Whether a fast layer is configured
    pub object_cache_enabled: bool,
    /// Durable row count, absent when the store could not be read
    pub total_entries: Option<u64>,
}

impl HealthReport {
    pub(crate) fn new(object_cache_enabled: bool) -> Self {
        Self {
            status: HealthStatus::Healthy,
            messages: Vec::new(),
            object_cache_enabled,
            total_entries: None,
        }
    }

    /// Records a problem, raising the status but never lowering it.
    pub(crate) fn escalate(&mut self, status: HealthStatus, message: impl Into<String>) {
        if rank(status) > rank(self.status) {
            self.status = status;
        }
        self.messages.push(message.into());
    }

    pub fn is_error(&self) -> bool {
        self.status == HealthStatus::Error
    }
}

fn rank(status: HealthStatus) -> u8 {
    match status {
        HealthStatus::Healthy => 0,
        HealthStatus::Warning => 1,
        HealthStatus::Error => 2,
    }
}
