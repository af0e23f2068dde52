//! Configuration Module
//!
//! Loads cache and server settings from environment variables.

use std::env;
use std::str::FromStr;

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite file backing the durable store
    pub database_path: String,
    /// Default TTL in seconds for entries stored without explicit TTL
    pub default_ttl: u64,
    /// HTTP server port for the admin API
    pub server_port: u16,
    /// Seconds between scheduled maintenance runs
    pub maintenance_interval: u64,
    /// Seconds before a stats snapshot is recomputed from the store
    pub stats_max_age: u64,
    /// Entry count at which health reports a warning
    pub entry_warning_threshold: u64,
    /// Upper bound on a single health probe, in milliseconds
    pub health_probe_timeout_ms: u64,
    /// Whether to put the in-process fast layer in front of the store
    pub fast_layer_enabled: bool,
    /// Capacity of the fast layer before LRU eviction
    pub fast_layer_max_entries: usize,
    /// Key namespace used in the fast layer
    pub namespace: String,
    /// Searches allowed per identity in a sliding hour
    pub rate_limit_per_hour: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DATABASE_PATH` - SQLite file (default: pricewise_cache.db)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 3600)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `MAINTENANCE_INTERVAL` - Maintenance frequency in seconds (default: 86400)
    /// - `STATS_MAX_AGE` - Stats snapshot lifetime in seconds (default: 3600)
    /// - `ENTRY_WARNING_THRESHOLD` - Health warning threshold (default: 10000)
    /// - `HEALTH_PROBE_TIMEOUT_MS` - Health probe bound (default: 2000)
    /// - `FAST_LAYER_ENABLED` - Enable the fast layer (default: true)
    /// - `FAST_LAYER_MAX_ENTRIES` - Fast layer capacity (default: 1000)
    /// - `CACHE_NAMESPACE` - Fast layer key namespace (default: pricewise_)
    /// - `RATE_LIMIT_PER_HOUR` - Searches per identity per hour (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            maintenance_interval: env_or("MAINTENANCE_INTERVAL", defaults.maintenance_interval),
            stats_max_age: env_or("STATS_MAX_AGE", defaults.stats_max_age),
            entry_warning_threshold: env_or(
                "ENTRY_WARNING_THRESHOLD",
                defaults.entry_warning_threshold,
            ),
            health_probe_timeout_ms: env_or(
                "HEALTH_PROBE_TIMEOUT_MS",
                defaults.health_probe_timeout_ms,
            ),
            fast_layer_enabled: env_or("FAST_LAYER_ENABLED", defaults.fast_layer_enabled),
            fast_layer_max_entries: env_or(
                "FAST_LAYER_MAX_ENTRIES",
                defaults.fast_layer_max_entries,
            ),
            namespace: env::var("CACHE_NAMESPACE").unwrap_or(defaults.namespace),
            rate_limit_per_hour: env_or("RATE_LIMIT_PER_HOUR", defaults.rate_limit_per_hour),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "pricewise_cache.db".to_string(),
            default_ttl: 3600,
            server_port: 3000,
            maintenance_interval: 86_400,
            stats_max_age: 3600,
            entry_warning_threshold: 10_000,
            health_probe_timeout_ms: 2000,
            fast_layer_enabled: true,
            fast_layer_max_entries: 1000,
            namespace: "pricewise_".to_string(),
            rate_limit_per_hour: 60,
        }
    }
}

/// Parses an env var, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.default_ttl, 3600);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.maintenance_interval, 86_400);
        assert!(config.fast_layer_enabled);
        assert_eq!(config.namespace, "pricewise_");
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("DEFAULT_TTL");
        env::remove_var("MAINTENANCE_INTERVAL");
        env::remove_var("ENTRY_WARNING_THRESHOLD");
        env::remove_var("FAST_LAYER_ENABLED");

        let config = Config::from_env();
        assert_eq!(config.default_ttl, 3600);
        assert_eq!(config.maintenance_interval, 86_400);
        assert_eq!(config.entry_warning_threshold, 10_000);
        assert!(config.fast_layer_enabled);
    }

    #[test]
    fn test_env_or_ignores_malformed_values() {
        env::set_var("PRICEWISE_TEST_MALFORMED", "not-a-number");
        let value: u64 = env_or("PRICEWISE_TEST_MALFORMED", 42);
        assert_eq!(value, 42);
        env::remove_var("PRICEWISE_TEST_MALFORMED");
    }
}
