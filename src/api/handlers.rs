//! API Handlers
//!
//! The demo server's downstream handlers, which sit behind the cache
//! middleware, plus the uncached admin endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::Utc;

use crate::adapter::{Adapter, MemoryAdapter};
use crate::config::Config;
use crate::error::Result;
use crate::middleware::HttpCache;
use crate::models::{HealthResponse, StatsResponse, TimeResponse};

/// Header carrying the time a demo response was generated.
pub const GENERATED_AT_HEADER: &str = "x-generated-at";

/// Application state shared across all handlers.
///
/// The in-memory store is held twice: type-erased inside the [`HttpCache`]
/// and concretely for occupancy stats and the cleanup task.
#[derive(Clone)]
pub struct AppState {
    pub cache: HttpCache,
    pub store: Arc<MemoryAdapter>,
}

impl AppState {
    /// Creates a new AppState around an existing store and cache.
    pub fn new(cache: HttpCache, store: Arc<MemoryAdapter>) -> Self {
        Self { cache, store }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the in-memory store and the interception settings, failing on
    /// any invalid value.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut store = MemoryAdapter::builder()
            .capacity(config.max_entries)
            .policy(config.policy()?);
        if let Some(max_bytes) = config.max_bytes {
            store = store.max_bytes(max_bytes);
        }
        let store = Arc::new(store.build()?);

        let mut cache = HttpCache::builder()
            .adapter(store.clone() as Arc<dyn Adapter>)
            .ttl(Duration::from_secs(config.default_ttl))
            .methods(config.methods()?)
            .vary_headers(config.vary_headers.iter().cloned())
            .write_expires_header(config.write_expires)
            .max_body_bytes(config.max_body_bytes);
        if let Some(refresh_key) = &config.refresh_key {
            cache = cache.refresh_key(refresh_key.clone());
        }
        if let Some(skip) = &config.skip_cache_header {
            cache = cache.skip_cache_header(skip.clone());
        }

        Ok(Self::new(cache.build()?, store))
    }
}

fn generated_at() -> String {
    Utc::now().to_rfc3339()
}

/// Handler for GET /time
///
/// Reports when the body was generated, so a cached replay is visible.
pub async fn time_handler(uri: Uri) -> Json<TimeResponse> {
    Json(TimeResponse {
        generated_at: generated_at(),
        path: uri.path().to_string(),
        query: uri.query().map(String::from),
    })
}

/// Handler for POST /echo
///
/// Returns the request body unchanged, stamped with its generation time.
pub async fn echo_handler(headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    if let Ok(value) = HeaderValue::from_str(&generated_at()) {
        response.headers_mut().insert(GENERATED_AT_HEADER, value);
    }
    response
}

/// Handler for GET /stats
///
/// Returns interception counters and store occupancy.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let store = state.store.stats().await;
    Json(StatsResponse::new(state.cache.stats(), store))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EvictionPolicy;
    use crate::error::CacheError;

    #[test]
    fn test_from_config_defaults() {
        let state = AppState::from_config(&Config::default()).unwrap();
        assert_eq!(state.store.policy(), EvictionPolicy::Lru);
        assert!(state.cache.is_cacheable(&axum::http::Method::GET));
    }

    #[test]
    fn test_from_config_rejects_zero_ttl() {
        let config = Config {
            default_ttl: 0,
            ..Config::default()
        };
        assert!(matches!(
            AppState::from_config(&config),
            Err(CacheError::InvalidTtl)
        ));
    }

    #[test]
    fn test_from_config_rejects_tiny_capacity() {
        let config = Config {
            max_entries: 1,
            ..Config::default()
        };
        assert!(matches!(
            AppState::from_config(&config),
            Err(CacheError::InvalidCapacity(_))
        ));
    }

    #[tokio::test]
    async fn test_time_handler_echoes_uri() {
        let uri: Uri = "/time?zone=utc".parse().unwrap();
        let response = time_handler(uri).await;
        assert_eq!(response.path, "/time");
        assert_eq!(response.query.as_deref(), Some("zone=utc"));
    }

    #[tokio::test]
    async fn test_echo_handler_returns_body() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = echo_handler(headers, Bytes::from_static(b"{\"x\":1}")).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert!(response.headers().contains_key(GENERATED_AT_HEADER));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, Bytes::from_static(b"{\"x\":1}"));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = AppState::from_config(&Config::default()).unwrap();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.cache.hits, 0);
        assert_eq!(response.store.entries, 0);
        assert_eq!(response.store.capacity, Some(1000));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
