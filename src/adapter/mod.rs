//! Store Adapter Module
//!
//! The storage contract shared by every backend. Adapters hold opaque
//! payloads keyed by request fingerprint; only the entry codec looks inside.

mod memory;
#[cfg(feature = "redis")]
mod redis;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::cache::{decode, encode, CacheEntry, CacheKey};

pub use memory::{MemoryAdapter, MemoryAdapterBuilder, StoreStats};
#[cfg(feature = "redis")]
pub use self::redis::RedisAdapter;

// == Lookup Outcome ==
/// Result of reading an entry for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A fresh entry, with the hit already recorded in the store
    Hit(CacheEntry),
    /// An entry existed but was stale; it has been released
    Expired,
    /// Nothing stored under the key
    Miss,
}

// == Adapter Trait ==
/// Key to payload storage used by the interception layer.
///
/// Implementations never fail the caller: backend errors degrade to a miss
/// on reads and to a no-op on writes.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Returns the stored payload, if any. Must not mutate the payload.
    async fn get(&self, key: CacheKey) -> Option<Bytes>;

    /// Stores a payload that becomes stale at `expiration`. Returns whether
    /// the payload was actually stored.
    async fn set(&self, key: CacheKey, payload: Bytes, expiration: DateTime<Utc>) -> bool;

    /// Removes a payload. Absent keys are a no-op.
    async fn release(&self, key: CacheKey);

    /// Reads an entry and, when it is still fresh, records the hit.
    ///
    /// Stale or undecodable entries are released. This default composes
    /// `get`, `set` and `release` and is therefore not atomic; in-process
    /// stores override it to run as one critical section.
    async fn lookup(&self, key: CacheKey, now: DateTime<Utc>) -> Lookup {
        let Some(payload) = self.get(key).await else {
            return Lookup::Miss;
        };

        let mut entry = decode(&payload);
        if !entry.is_fresh(now) {
            self.release(key).await;
            return Lookup::Expired;
        }

        entry.touch(now);
        match encode(&entry) {
            Ok(payload) => {
                self.set(key, payload, entry.expiration).await;
            }
            Err(err) => warn!("failed to re-encode entry {}: {}", key, err),
        }
        Lookup::Hit(entry)
    }
}
