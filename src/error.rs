//! Error types for the response cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the response cache.
///
/// Configuration variants are only ever returned from builders. The remaining
/// variants describe steady-state failures which the interception layer logs
/// and degrades into "serve fresh, don't cache".
#[derive(Error, Debug)]
pub enum CacheError {
    /// No store adapter was configured
    #[error("cache requires an adapter")]
    MissingAdapter,

    /// TTL was zero
    #[error("cache requires a positive ttl")]
    InvalidTtl,

    /// A method other than GET or POST was listed as cacheable
    #[error("unsupported cacheable method: {0}")]
    UnsupportedMethod(String),

    /// Entry-count capacity of one or less
    #[error("memory adapter requires a capacity greater than one, got {0}")]
    InvalidCapacity(usize),

    /// No eviction policy was configured
    #[error("memory adapter requires an eviction policy")]
    MissingPolicy,

    /// Neither an entry-count capacity nor a byte budget was configured
    #[error("memory adapter requires a capacity or a byte budget")]
    MissingBound,

    /// Eviction policy label could not be parsed
    #[error("unknown eviction policy: {0}")]
    UnknownPolicy(String),

    /// Header name in configuration is not a valid HTTP header name
    #[error("invalid header name: {0}")]
    InvalidHeader(String),

    /// Request body could not be buffered for key computation
    #[error("failed to buffer request body: {0}")]
    BodyRead(String),

    /// Entry could not be serialized or deserialized
    #[error("entry codec error: {0}")]
    Codec(String),

    /// Remote store failure
    #[error("cache backend error: {0}")]
    Backend(String),

    /// Downstream response body could not be buffered
    #[error("upstream response error: {0}")]
    Upstream(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Codec(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::BodyRead(_) => StatusCode::BAD_REQUEST,
            CacheError::Upstream(_) | CacheError::Backend(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the response cache.
pub type Result<T> = std::result::Result<T, CacheError>;
