//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check keying, codec and store invariants over generated input.

use std::collections::HashSet;

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use bytes::Bytes;
use chrono::{Duration, Utc};
use proptest::prelude::*;

use crate::adapter::{Adapter, MemoryAdapter};
use crate::cache::{
    decode, encode, normalize_url, CacheEntry, CacheKey, EvictionPolicy, KeyGenerator,
};

// == Strategies ==
/// Generates query parameters with names and values safe to place in a URL
fn query_params_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("[a-z]{1,6}", "[a-zA-Z0-9]{0,8}"), 0..8)
}

fn policy_strategy() -> impl Strategy<Value = EvictionPolicy> {
    prop_oneof![
        Just(EvictionPolicy::Lru),
        Just(EvictionPolicy::Mru),
        Just(EvictionPolicy::Lfu),
        Just(EvictionPolicy::Mfu),
    ]
}

#[derive(Debug, Clone)]
enum StoreOp {
    Set { key: u64, value: Vec<u8> },
    Release { key: u64 },
    Lookup { key: u64 },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        (0u64..40, prop::collection::vec(any::<u8>(), 0..64))
            .prop_map(|(key, value)| StoreOp::Set { key, value }),
        (0u64..40).prop_map(|key| StoreOp::Release { key }),
        (0u64..40).prop_map(|key| StoreOp::Lookup { key }),
    ]
}

fn key_for_query(params: &[(String, String)]) -> CacheKey {
    let query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    let uri: Uri = format!("/items?{}", query.join("&")).parse().unwrap();
    KeyGenerator::default().compute_key(
        &Method::GET,
        &normalize_url(&uri, Some("example.com")),
        None,
        &HeaderMap::new(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Requests differing only in query parameter order share a key.
    #[test]
    fn prop_query_order_independence(
        params in query_params_strategy(),
        seed in any::<u64>()
    ) {
        let mut shuffled = params.clone();
        // deterministic rotation + reversal keeps the multiset intact
        if !shuffled.is_empty() {
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
        }
        if seed % 2 == 0 {
            shuffled.reverse();
        }

        prop_assert_eq!(key_for_query(&params), key_for_query(&shuffled));
    }

    // Identical inputs always produce the identical key.
    #[test]
    fn prop_key_determinism(
        url in "/[a-z]{1,12}",
        body in prop::collection::vec(any::<u8>(), 0..128)
    ) {
        let generator = KeyGenerator::default();
        let headers = HeaderMap::new();
        let first = generator.compute_key(&Method::POST, &url, Some(&body), &headers);
        let second = generator.compute_key(&Method::POST, &url, Some(&body), &headers);
        prop_assert_eq!(first, second);
    }

    // decode(encode(entry)) == entry, including empty bodies and header lists.
    #[test]
    fn prop_codec_roundtrip(
        value in prop::collection::vec(any::<u8>(), 0..256),
        header_values in prop::collection::vec("[a-zA-Z0-9 ;=/-]{0,24}", 0..6),
        ttl_secs in 1i64..100_000,
        frequency in 1u64..1_000_000
    ) {
        let mut headers = HeaderMap::new();
        for (i, value) in header_values.iter().enumerate() {
            headers.append(
                format!("x-h{}", i % 3).parse::<axum::http::HeaderName>().unwrap(),
                value.parse().unwrap(),
            );
        }
        let mut entry = CacheEntry::new(
            StatusCode::OK,
            &headers,
            Bytes::from(value),
            Utc::now(),
            Duration::seconds(ttl_secs),
        );
        entry.frequency = frequency;

        let payload = encode(&entry).unwrap();
        prop_assert_eq!(decode(&payload), entry);
    }

    // Arbitrary bytes never panic the decoder.
    #[test]
    fn prop_decode_never_panics(payload in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode(&payload);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // The entry count never exceeds capacity after any operation sequence.
    #[test]
    fn prop_capacity_enforcement(
        capacity in 2usize..12,
        policy in policy_strategy(),
        ops in prop::collection::vec(store_op_strategy(), 1..120)
    ) {
        tokio_test::block_on(async {
            let adapter = MemoryAdapter::new(capacity, policy).unwrap();

            for op in ops {
                match op {
                    StoreOp::Set { key, value } => {
                        let entry = CacheEntry::new(
                            StatusCode::OK,
                            &HeaderMap::new(),
                            Bytes::from(value),
                            Utc::now(),
                            Duration::seconds(300),
                        );
                        adapter
                            .set(CacheKey(key), encode(&entry).unwrap(), entry.expiration)
                            .await;
                    }
                    StoreOp::Release { key } => adapter.release(CacheKey(key)).await,
                    StoreOp::Lookup { key } => {
                        let _ = adapter.lookup(CacheKey(key), Utc::now()).await;
                    }
                }
                let len = adapter.len().await;
                prop_assert!(len <= capacity, "Store size {} exceeds capacity {}", len, capacity);
            }
            Ok(())
        })?;
    }

    // Releasing an absent key leaves the store unchanged.
    #[test]
    fn prop_release_absent_is_noop(
        present in prop::collection::hash_set(0u64..1000, 1..10),
        absent in 1000u64..2000
    ) {
        tokio_test::block_on(async {
            let adapter = MemoryAdapter::new(64, EvictionPolicy::Lru).unwrap();
            for key in &present {
                let expiration = Utc::now() + Duration::seconds(60);
                adapter
                    .set(CacheKey(*key), Bytes::from_static(b"{}"), expiration)
                    .await;
            }
            let bytes_before = adapter.total_bytes().await;

            adapter.release(CacheKey(absent)).await;

            prop_assert_eq!(adapter.len().await, present.len());
            prop_assert_eq!(adapter.total_bytes().await, bytes_before);
            let mut survivors = HashSet::new();
            for key in &present {
                if adapter.get(CacheKey(*key)).await.is_some() {
                    survivors.insert(*key);
                }
            }
            prop_assert_eq!(&survivors, &present);
            Ok(())
        })?;
    }
}
