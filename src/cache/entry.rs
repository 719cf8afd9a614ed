//! Cache Entry Module
//!
//! Defines the stored unit (response payload plus expiration and access
//! statistics) and the codec that turns it into the opaque byte payload the
//! store adapters hold.

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

// == Header Field ==
/// One response header, kept in the order it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderField {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub value: Bytes,
}

// == Cache Entry ==
/// A cached response with its metadata.
///
/// `expiration` is fixed at creation; hits only move `last_access` and
/// `frequency`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Response body
    #[serde(with = "base64_bytes")]
    pub value: Bytes,
    /// Response headers, duplicates allowed
    #[serde(default)]
    pub headers: Vec<HeaderField>,
    /// Response status code
    #[serde(default = "default_status")]
    pub status: u16,
    /// Instant after which the entry is stale
    pub expiration: DateTime<Utc>,
    /// Most recent hit (or creation time)
    pub last_access: DateTime<Utc>,
    /// Number of times the entry was produced or served
    pub frequency: u64,
}

fn default_status() -> u16 {
    StatusCode::OK.as_u16()
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a freshly produced entry that lives for `ttl` from `now`.
    pub fn new(
        status: StatusCode,
        headers: &HeaderMap,
        value: Bytes,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            value,
            headers: headers
                .iter()
                .map(|(name, value)| HeaderField {
                    name: name.as_str().to_string(),
                    value: Bytes::copy_from_slice(value.as_bytes()),
                })
                .collect(),
            status: status.as_u16(),
            expiration: now + ttl,
            last_access: now,
            frequency: 1,
        }
    }

    // == Freshness ==
    /// An entry is servable only while `now` is strictly before its expiration.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expiration > now
    }

    // == Touch ==
    /// Records a hit.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_access = now;
        self.frequency = self.frequency.saturating_add(1);
    }

    /// Stored status, falling back to 200 for values outside the valid range.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK)
    }

    /// Rebuilds the stored headers, skipping any that are no longer valid.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for field in &self.headers {
            let name = HeaderName::from_bytes(field.name.as_bytes());
            let value = HeaderValue::from_bytes(&field.value);
            if let (Ok(name), Ok(value)) = (name, value) {
                map.append(name, value);
            }
        }
        map
    }
}

// == Codec ==
/// Serializes an entry into the payload handed to store adapters.
pub fn encode(entry: &CacheEntry) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(entry)?))
}

/// Deserializes a payload, propagating malformed input as an error.
pub fn try_decode(payload: &[u8]) -> Result<CacheEntry> {
    Ok(serde_json::from_slice(payload)?)
}

/// Deserializes a payload; malformed bytes yield the zero-value entry, which
/// is already expired and therefore reads as a miss.
pub fn decode(payload: &[u8]) -> CacheEntry {
    try_decode(payload).unwrap_or_else(|err| {
        debug!("discarding malformed cache payload: {}", err);
        CacheEntry::default()
    })
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn sample_entry(now: DateTime<Utc>) -> CacheEntry {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        CacheEntry::new(
            StatusCode::CREATED,
            &headers,
            Bytes::from_static(b"payload"),
            now,
            Duration::seconds(60),
        )
    }

    #[test]
    fn test_entry_creation() {
        let now = Utc::now();
        let entry = sample_entry(now);

        assert_eq!(entry.frequency, 1);
        assert_eq!(entry.last_access, now);
        assert_eq!(entry.expiration, now + Duration::seconds(60));
        assert_eq!(entry.status_code(), StatusCode::CREATED);
        assert_eq!(entry.headers.len(), 3);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Utc::now();
        let mut entry = sample_entry(now);

        entry.expiration = now;
        assert!(!entry.is_fresh(now), "Entry must not be served at its expiration");

        entry.expiration = now - Duration::seconds(1);
        assert!(!entry.is_fresh(now));

        entry.expiration = now + Duration::seconds(1);
        assert!(entry.is_fresh(now));
    }

    #[test]
    fn test_touch_keeps_expiration() {
        let now = Utc::now();
        let mut entry = sample_entry(now);
        let later = now + Duration::seconds(5);

        entry.touch(later);

        assert_eq!(entry.last_access, later);
        assert_eq!(entry.frequency, 2);
        assert_eq!(entry.expiration, now + Duration::seconds(60));
    }

    #[test]
    fn test_codec_roundtrip() {
        let entry = sample_entry(Utc::now());
        let payload = encode(&entry).unwrap();

        assert_eq!(decode(&payload), entry);
    }

    #[test]
    fn test_codec_roundtrip_empty_value_and_headers() {
        let entry = CacheEntry::new(
            StatusCode::OK,
            &HeaderMap::new(),
            Bytes::new(),
            Utc::now(),
            Duration::seconds(1),
        );
        let payload = encode(&entry).unwrap();

        assert_eq!(decode(&payload), entry);
    }

    #[test]
    fn test_decode_malformed_yields_zero_value() {
        let entry = decode(b"\x00not json");

        assert_eq!(entry, CacheEntry::default());
        assert!(!entry.is_fresh(Utc::now()));
        assert!(try_decode(b"{").is_err());
    }

    #[test]
    fn test_decode_defaults_missing_status() {
        let payload = br#"{"value":"aGk=","expiration":"2030-01-01T00:00:00Z","last_access":"2020-01-01T00:00:00Z","frequency":3}"#;
        let entry = try_decode(payload).unwrap();

        assert_eq!(entry.status, 200);
        assert_eq!(entry.value, Bytes::from_static(b"hi"));
        assert!(entry.headers.is_empty());
    }

    #[test]
    fn test_header_map_preserves_duplicates() {
        let entry = sample_entry(Utc::now());
        let map = entry.header_map();

        let cookies: Vec<_> = map.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }
}
