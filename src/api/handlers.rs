//! API Handlers
//!
//! HTTP handlers for the operator-facing cache endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::cache::{CacheManager, CacheStats, HealthReport};
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, GroupDeleteResponse, OperationResponse, SetRequest,
    SetResponse, StatsQuery,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheManager>,
}

impl AppState {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self { cache }
    }
}

/// Handler for PUT /set
///
/// Stores a payload with optional TTL and group.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl.unwrap_or(state.cache.policy().default_ttl);
    let group = req.group.as_deref().unwrap_or("");
    state.cache.set(&req.key, &req.value, ttl, group).await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// A miss is answered with 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key).await? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.cache.delete(&key).await?;
    Ok(Json(DeleteResponse { key, deleted }))
}

/// Handler for DELETE /groups/:group
pub async fn delete_group_handler(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<GroupDeleteResponse>> {
    let deleted = state.cache.delete_group(&group).await?;
    Ok(Json(GroupDeleteResponse { group, deleted }))
}

/// Handler for POST /flush
pub async fn flush_handler(State(state): State<AppState>) -> Result<Json<OperationResponse>> {
    state.cache.flush_all().await?;
    Ok(Json(OperationResponse::new("Cache flushed", None, Utc::now())))
}

/// Handler for POST /maintenance
///
/// Operator-triggered run of the scheduled maintenance.
pub async fn maintenance_handler(
    State(state): State<AppState>,
) -> Result<Json<OperationResponse>> {
    let deleted = state.cache.maintenance().await?;
    Ok(Json(OperationResponse::new(
        "Maintenance complete",
        Some(deleted),
        Utc::now(),
    )))
}

/// Handler for GET /stats?force=bool
pub async fn stats_handler(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<CacheStats>> {
    let stats = state.cache.get_stats(query.force).await?;
    Ok(Json(stats))
}

/// Handler for GET /health
///
/// Answers 503 when the durable store is unreachable.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.cache.check_health().await;
    let status = if report.is_error() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachePolicy, HealthStatus, SystemClock};
    use crate::storage::SqliteStore;

    async fn test_state() -> AppState {
        let cache = CacheManager::open(
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            None,
            Arc::new(SystemClock),
            CachePolicy::default(),
        )
        .await;
        AppState::new(Arc::new(cache))
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state().await;

        let req = SetRequest {
            key: "pw_api_abc".to_string(),
            value: "{\"hotels\":[]}".to_string(),
            ttl: None,
            group: None,
        };
        let result = set_handler(State(state.clone()), Json(req)).await;
        assert!(result.is_ok());

        let response = get_handler(State(state), Path("pw_api_abc".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, "{\"hotels\":[]}");
    }

    #[tokio::test]
    async fn test_get_miss_is_not_found() {
        let state = test_state().await;

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_group_handler() {
        let state = test_state().await;
        state.cache.set("pw_destination_1", "{}", 60, "").await.unwrap();

        let response = delete_group_handler(State(state), Path("pw_destination_".to_string()))
            .await
            .unwrap();
        assert_eq!(response.deleted, 1);
    }

    #[tokio::test]
    async fn test_maintenance_handler() {
        let state = test_state().await;
        let response = maintenance_handler(State(state)).await.unwrap();
        assert_eq!(response.deleted, Some(0));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let state = test_state().await;
        let (status, report) = health_handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(!report.object_cache_enabled);
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state().await;

        let req = SetRequest {
            key: "".to_string(),
            value: "value".to_string(),
            ttl: None,
            group: None,
        };
        let result = set_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }
}
