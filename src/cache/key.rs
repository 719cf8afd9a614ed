//! Key Generator Module
//!
//! Derives the 64-bit fingerprint a response is stored under from the request
//! method, the normalized URL and, when configured, the request body and a
//! fixed list of request header values.

use std::fmt;
use std::hash::Hasher;

use axum::http::{HeaderMap, HeaderName, Method, Uri};
use fnv::FnvHasher;
use url::form_urlencoded;

// == Cache Key ==
/// Fingerprint of a request's canonical byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(pub u64);

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// == Canonical Hasher ==
/// Unseeded FNV-1a 64 over length-prefixed fields.
#[derive(Default)]
struct CanonicalHasher(FnvHasher);

impl CanonicalHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.0.write(bytes);
    }

    /// Length prefix first, so adjacent fields cannot re-split into the same input.
    fn write_field(&mut self, bytes: &[u8]) {
        self.0.write(&(bytes.len() as u64).to_le_bytes());
        self.0.write(bytes);
    }

    fn finish(self) -> CacheKey {
        CacheKey(self.0.finish())
    }
}

// == Query Handling ==
/// Parses a raw query string into decoded name/value pairs, in order.
pub fn query_pairs(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes())
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect()
}

/// Serializes pairs back into a query string.
pub fn encode_query(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish()
}

/// Builds the normalized URL used for keying: scheme, host, path and the
/// query string with parameters sorted by name and then by value.
pub fn normalize_url(uri: &Uri, host: Option<&str>) -> String {
    let scheme = uri.scheme_str().unwrap_or("http");
    let host = uri
        .authority()
        .map(|authority| authority.as_str())
        .or(host)
        .unwrap_or("");

    let mut pairs = query_pairs(uri.query().unwrap_or(""));
    pairs.sort();

    let mut normalized = format!("{}://{}{}", scheme, host, uri.path());
    if !pairs.is_empty() {
        normalized.push('?');
        normalized.push_str(&encode_query(&pairs));
    }
    normalized
}

// == Key Generator ==
/// Computes cache keys. The header list is fixed at construction and folded
/// into every key in declaration order.
#[derive(Debug, Clone, Default)]
pub struct KeyGenerator {
    headers: Vec<HeaderName>,
}

impl KeyGenerator {
    pub fn new(headers: Vec<HeaderName>) -> Self {
        Self { headers }
    }

    pub fn headers(&self) -> &[HeaderName] {
        &self.headers
    }

    /// Hashes the canonical sequence for a request.
    ///
    /// Every component is length-prefixed; each configured header contributes
    /// its name, its value count and each value, so an absent header and an
    /// empty header hash differently.
    pub fn compute_key(
        &self,
        method: &Method,
        normalized_url: &str,
        body: Option<&[u8]>,
        request_headers: &HeaderMap,
    ) -> CacheKey {
        let mut hasher = CanonicalHasher::default();
        hasher.write_field(method.as_str().as_bytes());
        hasher.write_field(normalized_url.as_bytes());

        match body {
            Some(body) => {
                hasher.write(&[1]);
                hasher.write_field(body);
            }
            None => hasher.write(&[0]),
        }

        for name in &self.headers {
            hasher.write_field(name.as_str().as_bytes());
            let values: Vec<_> = request_headers.get_all(name).iter().collect();
            hasher.write(&(values.len() as u64).to_le_bytes());
            for value in values {
                hasher.write_field(value.as_bytes());
            }
        }

        hasher.finish()
    }
}
