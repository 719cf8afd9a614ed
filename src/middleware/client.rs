//! Cache client configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, Method};

use crate::adapter::Adapter;
use crate::cache::{CacheCounters, CacheStats, KeyGenerator, DEFAULT_MAX_BODY_BYTES};
use crate::error::{CacheError, Result};

// == Http Cache ==
/// Validated interception settings plus the shared store and counters.
///
/// Cheap to clone; every clone refers to the same adapter and counters.
#[derive(Clone)]
pub struct HttpCache {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) adapter: Arc<dyn Adapter>,
    pub(crate) ttl: chrono::Duration,
    pub(crate) refresh_key: Option<String>,
    pub(crate) methods: Vec<Method>,
    pub(crate) keys: KeyGenerator,
    pub(crate) skip_header: Option<HeaderName>,
    pub(crate) write_expires: bool,
    pub(crate) max_body_bytes: usize,
    pub(crate) counters: CacheCounters,
}

impl HttpCache {
    pub fn builder() -> HttpCacheBuilder {
        HttpCacheBuilder::default()
    }

    pub(crate) fn inner(&self) -> &Inner {
        &self.inner
    }

    /// Whether requests with this method go through lookup and population.
    pub fn is_cacheable(&self, method: &Method) -> bool {
        self.inner.methods.contains(method)
    }

    /// Methods whose request body is part of the key.
    pub(crate) fn reads_body(method: &Method) -> bool {
        *method == Method::POST
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.counters.snapshot()
    }
}

impl std::fmt::Debug for HttpCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCache")
            .field("ttl", &self.inner.ttl)
            .field("refresh_key", &self.inner.refresh_key)
            .field("methods", &self.inner.methods)
            .field("vary_headers", &self.inner.keys.headers())
            .field("skip_header", &self.inner.skip_header)
            .field("write_expires", &self.inner.write_expires)
            .field("max_body_bytes", &self.inner.max_body_bytes)
            .finish()
    }
}

// == Builder ==
/// Collects options for [`HttpCache`]; `build` validates them.
pub struct HttpCacheBuilder {
    adapter: Option<Arc<dyn Adapter>>,
    ttl: Option<Duration>,
    refresh_key: Option<String>,
    methods: Option<Vec<Method>>,
    vary_headers: Vec<String>,
    skip_header: Option<String>,
    write_expires: bool,
    max_body_bytes: usize,
}

impl Default for HttpCacheBuilder {
    fn default() -> Self {
        Self {
            adapter: None,
            ttl: None,
            refresh_key: None,
            methods: None,
            vary_headers: Vec::new(),
            skip_header: None,
            write_expires: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl HttpCacheBuilder {
    /// Store used for every cached response. Required.
    pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Lifetime of an entry from creation. Required, must be positive.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Query parameter whose presence forces the entry to be regenerated.
    pub fn refresh_key(mut self, name: impl Into<String>) -> Self {
        self.refresh_key = Some(name.into());
        self
    }

    /// Cacheable methods; GET and POST only. Defaults to GET.
    pub fn methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.methods = Some(methods.into_iter().collect());
        self
    }

    /// Request headers whose values are folded into the key, in this order.
    pub fn vary_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vary_headers = names.into_iter().map(Into::into).collect();
        self
    }

    /// Response header that, when present, keeps a response out of the store.
    pub fn skip_cache_header(mut self, name: impl Into<String>) -> Self {
        self.skip_header = Some(name.into());
        self
    }

    /// Emit an `Expires` header carrying the entry's expiration.
    pub fn write_expires_header(mut self, enabled: bool) -> Self {
        self.write_expires = enabled;
        self
    }

    /// Largest request body buffered for key computation.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn build(self) -> Result<HttpCache> {
        let adapter = self.adapter.ok_or(CacheError::MissingAdapter)?;

        let ttl = self
            .ttl
            .filter(|ttl| !ttl.is_zero())
            .ok_or(CacheError::InvalidTtl)?;
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| CacheError::InvalidTtl)?;

        let mut methods = Vec::new();
        for method in self.methods.unwrap_or_else(|| vec![Method::GET]) {
            if method != Method::GET && method != Method::POST {
                return Err(CacheError::UnsupportedMethod(method.to_string()));
            }
            if !methods.contains(&method) {
                methods.push(method);
            }
        }

        let headers = self
            .vary_headers
            .iter()
            .map(|name| parse_header_name(name))
            .collect::<Result<Vec<_>>>()?;

        let skip_header = self
            .skip_header
            .as_deref()
            .map(parse_header_name)
            .transpose()?;

        Ok(HttpCache {
            inner: Arc::new(Inner {
                adapter,
                ttl,
                refresh_key: self.refresh_key.filter(|key| !key.is_empty()),
                methods,
                keys: KeyGenerator::new(headers),
                skip_header,
                write_expires: self.write_expires,
                max_body_bytes: self.max_body_bytes,
                counters: CacheCounters::new(),
            }),
        })
    }
}

fn parse_header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| CacheError::InvalidHeader(name.to_string()))
}
