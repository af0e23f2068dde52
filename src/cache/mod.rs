//! Cache Module
//!
//! Response cache for upstream API calls: fingerprinting, the two-tier
//! cache manager, statistics and health reporting.

pub mod clock;
mod entry;
pub mod fingerprint;
mod health;
mod manager;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use fingerprint::Fingerprint;
pub use health::{HealthReport, HealthStatus};
pub use manager::{CacheManager, CachePolicy};
pub use stats::CacheStats;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 255;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 4 * 1024 * 1024; // 4 MiB
