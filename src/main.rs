//! PriceWise Cache - operator service
//!
//! Runs the cache manager with its maintenance schedule and serves the admin
//! API (flush, maintenance, group delete, stats, health).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pricewise_cache::api::{create_router, AppState};
use pricewise_cache::cache::{CacheManager, CachePolicy, Clock, SystemClock};
use pricewise_cache::fast::{FastLayer, MemoryFastLayer};
use pricewise_cache::search_log::SearchLog;
use pricewise_cache::storage::{DurableStore, SqliteStore};
use pricewise_cache::{spawn_maintenance_task, Config};

/// Search audit rows older than this are dropped at startup.
const SEARCH_LOG_RETENTION_SECS: i64 = 30 * 24 * 3600;

/// Main entry point for the cache service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the durable store, the search log and, if enabled, the fast layer
/// 4. Start the background maintenance task
/// 5. Serve the admin API until SIGINT/SIGTERM
/// 6. Persist stats on the way out
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pricewise_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PriceWise cache service");

    let config = Config::from_env();
    info!(
        "Configuration loaded: database={}, default_ttl={}s, port={}, maintenance_interval={}s, fast_layer={}",
        config.database_path,
        config.default_ttl,
        config.server_port,
        config.maintenance_interval,
        config.fast_layer_enabled
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("opening durable store at {}", config.database_path))?;
    store.ping().await.context("durable store not responding")?;

    // Same database file as the cache store
    let search_log = SearchLog::open(
        &config.database_path,
        clock.clone(),
        config.rate_limit_per_hour,
    )
    .with_context(|| format!("opening search log at {}", config.database_path))?;
    match search_log.purge_older_than(SEARCH_LOG_RETENTION_SECS).await {
        Ok(removed) => info!(
            "Search log ready: limit={} searches/hour, purged {} old rows",
            search_log.limit_per_hour(),
            removed
        ),
        Err(e) => warn!("Search log purge failed: {}", e),
    }

    let fast: Option<Arc<dyn FastLayer>> = if config.fast_layer_enabled {
        Some(Arc::new(MemoryFastLayer::new(
            config.namespace.clone(),
            config.fast_layer_max_entries,
            clock.clone(),
        )))
    } else {
        None
    };

    let cache = Arc::new(
        CacheManager::open(
            Arc::new(store),
            fast,
            clock,
            CachePolicy::from(&config),
        )
        .await,
    );

    let maintenance_handle = spawn_maintenance_task(
        cache.clone(),
        Duration::from_secs(config.maintenance_interval),
    );

    let app = create_router(AppState::new(cache.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(maintenance_handle))
        .await
        .context("serving admin API")?;

    if let Err(e) = cache.persist_stats().await {
        warn!("Could not persist cache stats on shutdown: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops maintenance.
async fn shutdown_signal(maintenance_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    maintenance_handle.abort();
    warn!("Maintenance task aborted");
}
