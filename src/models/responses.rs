//! Response DTOs for the demo server
//!
//! Defines the structure of outgoing JSON bodies.

use serde::Serialize;

use crate::adapter::StoreStats;
use crate::cache::CacheStats;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Interception counters
    pub cache: CacheStats,
    /// In-memory store occupancy
    pub store: StoreStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(cache: CacheStats, store: StoreStats) -> Self {
        Self {
            hit_rate: cache.hit_rate(),
            cache,
            store,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Body produced by the cached demo route (GET /time).
#[derive(Debug, Clone, Serialize)]
pub struct TimeResponse {
    pub generated_at: String,
    pub path: String,
    pub query: Option<String>,
}
