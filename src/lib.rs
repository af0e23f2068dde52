//! PriceWise Cache - response cache for upstream hotel and pricing APIs
//!
//! Fingerprints upstream requests, serves repeated requests from an optional
//! fast layer backed by a durable SQLite store, and keeps hit/miss and
//! occupancy statistics.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fast;
pub mod models;
pub mod search_log;
pub mod storage;
pub mod tasks;
pub mod upstream;

pub use api::AppState;
pub use cache::{CacheManager, CachePolicy, CacheStats, Fingerprint};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_maintenance_task;
