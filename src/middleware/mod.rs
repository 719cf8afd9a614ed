//! Middleware Module
//!
//! The request interception layer: validated configuration in [`HttpCache`]
//! and the axum middleware function that runs the lookup/populate protocol.
//!
//! ```ignore
//! let store = Arc::new(MemoryAdapter::new(1000, EvictionPolicy::Lru)?);
//! let cache = HttpCache::builder()
//!     .adapter(store)
//!     .ttl(Duration::from_secs(60))
//!     .refresh_key("refresh")
//!     .build()?;
//!
//! let app = Router::new()
//!     .route("/items", get(list_items))
//!     .layer(axum::middleware::from_fn_with_state(cache, cache_middleware));
//! ```

mod client;
mod intercept;

pub use client::{HttpCache, HttpCacheBuilder};
pub use intercept::cache_middleware;
