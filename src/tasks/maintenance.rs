//! Cache Maintenance Task
//!
//! Background task that periodically sweeps expired rows from the durable
//! store. A failed run is logged and retried on the next interval; expired
//! rows are excluded from reads in the meantime.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheManager;

/// Spawns a background task that runs `CacheManager::maintenance` every
/// `interval`.
///
/// The first run happens one full interval after spawning.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_maintenance_task(cache.clone(), Duration::from_secs(86_400));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_maintenance_task(cache: Arc<CacheManager>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting cache maintenance task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.maintenance().await {
                Ok(0) => debug!("Cache maintenance: no expired entries found"),
                Ok(removed) => info!("Cache maintenance: removed {} expired entries", removed),
                Err(e) => warn!("Cache maintenance failed, retrying next interval: {}", e),
            }
        }
    })
}
