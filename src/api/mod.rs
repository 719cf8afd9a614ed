//! API Module
//!
//! A small demo server built on the cache middleware.
//!
//! # Endpoints
//! - `GET /time` - Cached demo route
//! - `POST /echo` - Cached demo route keyed on the request body
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
