//! API Routes
//!
//! Configures the Axum router with the operator-facing cache endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_group_handler, delete_handler, flush_handler, get_handler, health_handler,
    maintenance_handler, set_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /set` - Store a payload
/// - `GET /get/:key` - Look up a payload
/// - `DELETE /del/:key` - Delete one entry
/// - `DELETE /groups/:group` - Delete every entry of a group
/// - `POST /flush` - Empty the cache
/// - `POST /maintenance` - Sweep expired entries now
/// - `GET /stats` - Cache statistics (`?force=true` recounts)
/// - `GET /health` - Health report
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/groups/:group", delete(delete_group_handler))
        .route("/flush", post(flush_handler))
        .route("/maintenance", post(maintenance_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
