//! API Routes
//!
//! Configures the demo router: cached application routes behind the cache
//! middleware, and uncached admin endpoints beside them.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{echo_handler, health_handler, stats_handler, time_handler, AppState};
use crate::middleware::cache_middleware;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /time` - Cached; reports when the body was generated
/// - `POST /echo` - Cached when POST is a cacheable method; echoes the body
/// - `GET /stats` - Cache and store statistics
/// - `GET /health` - Health check endpoint
pub fn create_router(state: AppState) -> Router {
    let cached = Router::new()
        .route("/time", get(time_handler))
        .route("/echo", post(echo_handler))
        .route_layer(from_fn_with_state(state.cache.clone(), cache_middleware));

    let admin = Router::new()
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    cached.merge(admin).layer(TraceLayer::new_for_http())
}
