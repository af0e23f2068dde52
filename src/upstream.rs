//! Cached Upstream Fetching
//!
//! Fetch-through wrapper used by the API-calling code: look the request up
//! in the cache, call the upstream API on a miss, and write the response back.
//! Cache trouble never hides a successful upstream response.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheManager, Fingerprint};
use crate::error::{CacheError, Result};

// == Upstream Trait ==
/// The remote API. Request construction and authentication live behind it.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self, endpoint: &str, params: &Value) -> anyhow::Result<String>;
}

// == Api Request ==
/// A logical upstream call.
#[derive(Debug, Clone, Serialize)]
pub struct ApiRequest {
    /// Stable endpoint identifier, e.g. `hotels/search`
    pub endpoint: String,
    pub params: Value,
    /// Cache group, also the key prefix
    pub group: String,
    /// TTL override in seconds
    pub ttl: Option<u64>,
}

impl ApiRequest {
    pub fn new(endpoint: impl Into<String>, params: Value, group: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params,
            group: group.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn fingerprint(&self) -> Result<String> {
        Fingerprint::build(&self.group, &self.endpoint, &self.params)
    }
}

// == Fetch Outcome ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub payload: String,
    /// Served without calling the upstream API
    pub from_cache: bool,
    /// Payload is stored in the cache after this call
    pub persisted: bool,
}

// == Cached Fetcher ==
pub struct CachedFetcher<U> {
    cache: Arc<CacheManager>,
    upstream: U,
}

impl<U: Upstream> CachedFetcher<U> {
    pub fn new(cache: Arc<CacheManager>, upstream: U) -> Self {
        Self { cache, upstream }
    }

    pub async fn fetch(&self, request: &ApiRequest) -> Result<FetchOutcome> {
        let key = request.fingerprint()?;

        if let Some(payload) = self.cache.get(&key).await? {
            return Ok(FetchOutcome {
                payload,
                from_cache: true,
                persisted: true,
            });
        }

        debug!("Fetching {} from upstream", request.endpoint);
        let payload = self
            .upstream
            .fetch(&request.endpoint, &request.params)
            .await
            .map_err(|e| CacheError::Upstream(format!("{}: {:#}", request.endpoint, e)))?;

        let ttl = request.ttl.unwrap_or(self.cache.policy().default_ttl);
        let persisted = match self.cache.set(&key, &payload, ttl, &request.group).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Serving uncached response for {}: {}", request.endpoint, e);
                false
            }
        };

        Ok(FetchOutcome {
            payload,
            from_cache: false,
            persisted,
        })
    }
}
