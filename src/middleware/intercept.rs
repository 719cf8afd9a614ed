//! Request interception.
//!
//! Per request: method check, key computation (buffering and replaying the
//! body when it is part of the key), optional forced refresh, lookup, and on
//! a miss, running the downstream handler and storing its buffered response.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{
        header,
        uri::{PathAndQuery, Uri},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, warn};

use super::HttpCache;
use crate::adapter::Lookup;
use crate::cache::key::{encode_query, query_pairs};
use crate::cache::{encode, normalize_url, CacheEntry, ERROR_STATUS_THRESHOLD};
use crate::error::CacheError;

// == Middleware ==
/// Axum middleware serving cached responses and populating the store.
///
/// Install with `axum::middleware::from_fn_with_state(cache, cache_middleware)`.
pub async fn cache_middleware(
    State(cache): State<HttpCache>,
    request: Request,
    next: Next,
) -> Response {
    let inner = cache.inner();

    if !cache.is_cacheable(request.method()) {
        inner.counters.record_bypass();
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();

    let (body, key_body) = if HttpCache::reads_body(&parts.method) {
        match buffer_body(body, inner.max_body_bytes).await {
            Ok(bytes) => (Body::from(bytes.clone()), Some(bytes)),
            Err((err, body)) => {
                warn!("{}, passing {} {} through uncached", err, parts.method, parts.uri);
                inner.counters.record_bypass();
                return next.run(Request::from_parts(parts, body)).await;
            }
        }
    } else {
        (body, None)
    };

    let mut forced_refresh = false;
    if let Some(refresh_key) = &inner.refresh_key {
        if let Some(stripped) = strip_query_param(&parts.uri, refresh_key) {
            parts.uri = stripped;
            forced_refresh = true;
        }
    }

    let host = parts.headers.get(header::HOST).and_then(|v| v.to_str().ok());
    let url = normalize_url(&parts.uri, host);
    let key = inner
        .keys
        .compute_key(&parts.method, &url, key_body.as_deref(), &parts.headers);

    if forced_refresh {
        inner.adapter.release(key).await;
        inner.counters.record_invalidation();
        debug!("refresh requested for {} ({}), entry released", url, key);
    } else {
        match inner.adapter.lookup(key, Utc::now()).await {
            Lookup::Hit(entry) => {
                inner.counters.record_hit();
                debug!("cache hit for {} ({})", url, key);
                return cached_response(&entry, inner.write_expires);
            }
            Lookup::Expired => debug!("stale entry for {} ({}) released", url, key),
            Lookup::Miss => debug!("cache miss for {} ({})", url, key),
        }
    }
    inner.counters.record_miss();

    let response = next.run(Request::from_parts(parts, body)).await;
    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("failed to buffer response for {}: {}", url, err);
            return CacheError::Upstream(err.to_string()).into_response();
        }
    };

    if is_storable(parts.status, &parts.headers, inner.skip_header.as_ref()) {
        let entry = CacheEntry::new(
            parts.status,
            &parts.headers,
            bytes.clone(),
            Utc::now(),
            inner.ttl,
        );
        match encode(&entry) {
            Ok(payload) => {
                if inner.adapter.set(key, payload, entry.expiration).await {
                    inner.counters.record_store();
                    debug!("stored response for {} ({})", url, key);
                    if inner.write_expires {
                        set_expires(&mut parts.headers, entry.expiration);
                    }
                } else {
                    debug!("store declined response for {} ({})", url, key);
                }
            }
            Err(err) => warn!("failed to encode response for {}: {}", url, err),
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}

// == Helpers ==
/// Buffers a request body up to `limit` bytes.
///
/// On failure the error is returned together with a body that replays what
/// was read followed by whatever comes next: the unread remainder of an
/// oversized body, or the stream error itself, so the downstream handler
/// observes the same body it would have seen without the cache.
async fn buffer_body(body: Body, limit: usize) -> Result<Bytes, (CacheError, Body)> {
    let mut stream = body.into_data_stream();
    let mut buffered = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) if buffered.len() + chunk.len() > limit => {
                let head = futures::stream::iter([
                    Ok::<Bytes, axum::Error>(buffered.freeze()),
                    Ok(chunk),
                ]);
                let err = CacheError::BodyRead(format!("body exceeds {} bytes", limit));
                return Err((err, Body::from_stream(head.chain(stream))));
            }
            Ok(chunk) => buffered.extend_from_slice(&chunk),
            Err(err) => {
                let cause = CacheError::BodyRead(err.to_string());
                let replay = futures::stream::iter([Ok(buffered.freeze()), Err(err)]);
                return Err((cause, Body::from_stream(replay.chain(stream))));
            }
        }
    }

    Ok(buffered.freeze())
}

/// Removes every occurrence of `name` from the query string. Returns `None`
/// when the parameter is absent.
fn strip_query_param(uri: &Uri, name: &str) -> Option<Uri> {
    let pairs = query_pairs(uri.query()?);
    if !pairs.iter().any(|(key, _)| key == name) {
        return None;
    }

    let kept: Vec<_> = pairs.into_iter().filter(|(key, _)| key != name).collect();
    let mut path_and_query = uri.path().to_string();
    if !kept.is_empty() {
        path_and_query.push('?');
        path_and_query.push_str(&encode_query(&kept));
    }

    let mut uri_parts = uri.clone().into_parts();
    uri_parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(uri_parts).ok()
}

fn is_storable(status: StatusCode, headers: &HeaderMap, skip_header: Option<&HeaderName>) -> bool {
    if status.as_u16() >= ERROR_STATUS_THRESHOLD {
        return false;
    }
    match skip_header {
        Some(name) => !headers.contains_key(name),
        None => true,
    }
}

fn cached_response(entry: &CacheEntry, write_expires: bool) -> Response {
    let mut response = Response::new(Body::from(entry.value.clone()));
    *response.status_mut() = entry.status_code();
    *response.headers_mut() = entry.header_map();
    if write_expires {
        set_expires(response.headers_mut(), entry.expiration);
    }
    response
}

/// Formats a timestamp as an IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub(crate) fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn set_expires(headers: &mut HeaderMap, expiration: DateTime<Utc>) {
    if let Ok(value) = HeaderValue::from_str(&http_date(expiration)) {
        headers.insert(header::EXPIRES, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_http_date_format() {
        let at = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(http_date(at), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_strip_query_param() {
        let uri: Uri = "/a?x=1&refresh=true&y=2".parse().unwrap();
        let stripped = strip_query_param(&uri, "refresh").unwrap();
        assert_eq!(stripped.to_string(), "/a?x=1&y=2");

        let only: Uri = "/a?refresh".parse().unwrap();
        assert_eq!(strip_query_param(&only, "refresh").unwrap().to_string(), "/a");

        let absent: Uri = "/a?x=1".parse().unwrap();
        assert!(strip_query_param(&absent, "refresh").is_none());

        let no_query: Uri = "/a".parse().unwrap();
        assert!(strip_query_param(&no_query, "refresh").is_none());
    }

    #[test]
    fn test_is_storable() {
        let skip = HeaderName::from_static("x-no-cache");
        let mut marked = HeaderMap::new();
        marked.insert(skip.clone(), HeaderValue::from_static("1"));

        assert!(is_storable(StatusCode::OK, &HeaderMap::new(), Some(&skip)));
        assert!(is_storable(StatusCode::FOUND, &HeaderMap::new(), None));
        assert!(!is_storable(StatusCode::NOT_FOUND, &HeaderMap::new(), None));
        assert!(!is_storable(StatusCode::INTERNAL_SERVER_ERROR, &HeaderMap::new(), None));
        assert!(!is_storable(StatusCode::OK, &marked, Some(&skip)));
        assert!(is_storable(StatusCode::OK, &marked, None));
    }

    #[tokio::test]
    async fn test_buffer_body_within_limit() {
        let bytes = buffer_body(Body::from("hello"), 16).await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_buffer_body_stream_error_is_replayed() {
        let chunks = futures::stream::iter([
            Ok::<_, std::io::Error>(Bytes::from_static(b"{\"amount\":10")),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "client reset")),
        ]);
        let (err, body) = buffer_body(Body::from_stream(chunks), 1024).await.unwrap_err();
        assert!(matches!(err, CacheError::BodyRead(msg) if msg.contains("client reset")));

        assert!(to_bytes(body, usize::MAX).await.is_err());
    }

    #[tokio::test]
    async fn test_buffer_body_over_limit_replays_everything() {
        let (err, body) = buffer_body(Body::from("0123456789"), 4).await.unwrap_err();
        assert!(matches!(err, CacheError::BodyRead(_)));

        let replayed = to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(replayed, Bytes::from_static(b"0123456789"));
    }
}
