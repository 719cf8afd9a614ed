//! Mini HTTP Cache - response caching middleware for axum
//!
//! Keys requests by method, normalized URL, body and selected headers, stores
//! whole responses in a pluggable adapter, and replays them until they expire.
//! The bundled in-memory adapter bounds its size with LRU, MRU, LFU or MFU
//! eviction.

pub mod adapter;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod tasks;

pub use adapter::{Adapter, Lookup, MemoryAdapter};
pub use api::AppState;
pub use cache::EvictionPolicy;
pub use config::Config;
pub use error::{CacheError, Result};
pub use middleware::{cache_middleware, HttpCache};
pub use tasks::spawn_cleanup_task;
