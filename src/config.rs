//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;

use axum::http::Method;

use crate::cache::{EvictionPolicy, DEFAULT_MAX_BODY_BYTES};
use crate::error::{CacheError, Result};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Optional byte budget for stored payloads
    pub max_bytes: Option<usize>,
    /// Eviction policy label (LRU, MRU, LFU or MFU)
    pub eviction_policy: String,
    /// Entry lifetime in seconds
    pub default_ttl: u64,
    /// Query parameter that forces a refresh
    pub refresh_key: Option<String>,
    /// Cacheable methods
    pub cache_methods: Vec<String>,
    /// Request headers folded into the key
    pub vary_headers: Vec<String>,
    /// Response header that suppresses storing
    pub skip_cache_header: Option<String>,
    /// Emit an Expires header on cached responses
    pub write_expires: bool,
    /// Largest request body buffered for keying
    pub max_body_bytes: usize,
    /// HTTP server port
    pub server_port: u16,
    /// Background purge interval in seconds
    pub cleanup_interval: u64,
}

fn parsed<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn list(name: &str) -> Option<Vec<String>> {
    non_empty(name).map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect()
    })
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `MAX_BYTES` - Byte budget for payloads (default: unbounded)
    /// - `EVICTION_POLICY` - LRU, MRU, LFU or MFU (default: LRU)
    /// - `DEFAULT_TTL` - Entry lifetime in seconds (default: 300)
    /// - `REFRESH_KEY` - Refresh query parameter (default: unset)
    /// - `CACHE_METHODS` - Comma-separated cacheable methods (default: GET)
    /// - `VARY_HEADERS` - Comma-separated request headers in the key (default: none)
    /// - `SKIP_CACHE_HEADER` - Response header that prevents storing (default: unset)
    /// - `WRITE_EXPIRES` - Emit Expires header, `true`/`false` (default: false)
    /// - `MAX_BODY_BYTES` - Request body buffering limit (default: 1 MB)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Purge frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: parsed("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            max_bytes: parsed("MAX_BYTES"),
            eviction_policy: non_empty("EVICTION_POLICY").unwrap_or(defaults.eviction_policy),
            default_ttl: parsed("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            refresh_key: non_empty("REFRESH_KEY"),
            cache_methods: list("CACHE_METHODS").unwrap_or(defaults.cache_methods),
            vary_headers: list("VARY_HEADERS").unwrap_or_default(),
            skip_cache_header: non_empty("SKIP_CACHE_HEADER"),
            write_expires: parsed("WRITE_EXPIRES").unwrap_or(defaults.write_expires),
            max_body_bytes: parsed("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            server_port: parsed("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parsed("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
        }
    }

    /// Parses the configured eviction policy.
    pub fn policy(&self) -> Result<EvictionPolicy> {
        self.eviction_policy.parse()
    }

    /// Parses the configured cacheable methods.
    pub fn methods(&self) -> Result<Vec<Method>> {
        self.cache_methods
            .iter()
            .map(|name| {
                Method::from_bytes(name.to_ascii_uppercase().as_bytes())
                    .map_err(|_| CacheError::UnsupportedMethod(name.clone()))
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_bytes: None,
            eviction_policy: "LRU".to_string(),
            default_ttl: 300,
            refresh_key: None,
            cache_methods: vec!["GET".to_string()],
            vary_headers: Vec::new(),
            skip_cache_header: None,
            write_expires: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            server_port: 3000,
            cleanup_interval: 1,
        }
    }
}
