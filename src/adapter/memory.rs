//! In-Memory Adapter
//!
//! Bounded key/payload map with an entry-count capacity, an optional byte
//! budget and one of four eviction policies. A single write lock covers every
//! mutation, including the victim search, so the bounds hold even under
//! concurrent writers.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Adapter, Lookup};
use crate::cache::{
    decode, encode, CacheEntry, CacheKey, EntryMeta, EvictionIndex, EvictionPolicy,
};
use crate::error::{CacheError, Result};

// == Store Stats ==
/// Snapshot of the store's occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub bytes: usize,
    pub evictions: u64,
    pub expirations: u64,
    pub capacity: Option<usize>,
    pub max_bytes: Option<usize>,
    pub policy: String,
}

#[derive(Debug)]
struct Slot {
    payload: Bytes,
    meta: EntryMeta,
}

// == Store State ==
/// Everything guarded by the adapter's lock.
#[derive(Debug, Default)]
struct StoreState {
    slots: HashMap<CacheKey, Slot>,
    index: EvictionIndex,
    total_bytes: usize,
    next_seq: u64,
    evictions: u64,
    expirations: u64,
}

impl StoreState {
    /// Inserts or overwrites a slot. Overwrites keep the key's sequence number.
    ///
    /// `entry` is the decoded form of `payload`; its recency and frequency
    /// feed the eviction index.
    fn put(
        &mut self,
        key: CacheKey,
        payload: Bytes,
        entry: &CacheEntry,
        expiration: DateTime<Utc>,
    ) {
        let seq = match self.slots.get(&key) {
            Some(existing) => existing.meta.seq,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                seq
            }
        };

        let meta = EntryMeta {
            last_access: entry.last_access,
            frequency: entry.frequency,
            expiration,
            seq,
        };
        let size = payload.len();
        if let Some(old) = self.slots.insert(key, Slot { payload, meta }) {
            self.index.remove(key, &old.meta);
            self.total_bytes -= old.payload.len();
        }
        self.index.insert(key, &meta);
        self.total_bytes += size;
    }

    fn remove(&mut self, key: CacheKey) -> Option<Slot> {
        let slot = self.slots.remove(&key)?;
        self.index.remove(key, &slot.meta);
        self.total_bytes -= slot.payload.len();
        Some(slot)
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired = self.index.expired(now);
        for key in &expired {
            self.remove(*key);
        }
        self.expirations += expired.len() as u64;
        expired.len()
    }
}

// == Builder ==
/// Configures a [`MemoryAdapter`].
#[derive(Debug, Default)]
pub struct MemoryAdapterBuilder {
    capacity: Option<usize>,
    max_bytes: Option<usize>,
    policy: Option<EvictionPolicy>,
}

impl MemoryAdapterBuilder {
    /// Maximum number of entries; must be greater than one.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Maximum total payload size in bytes.
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    pub fn policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<MemoryAdapter> {
        if let Some(capacity) = self.capacity {
            if capacity <= 1 {
                return Err(CacheError::InvalidCapacity(capacity));
            }
        }
        if self.capacity.is_none() && self.max_bytes.is_none() {
            return Err(CacheError::MissingBound);
        }
        let policy = self.policy.ok_or(CacheError::MissingPolicy)?;

        Ok(MemoryAdapter {
            state: RwLock::new(StoreState {
                slots: HashMap::with_capacity(self.capacity.unwrap_or_default()),
                ..StoreState::default()
            }),
            capacity: self.capacity,
            max_bytes: self.max_bytes,
            policy,
        })
    }
}

// == Memory Adapter ==
/// Shared in-process store.
#[derive(Debug)]
pub struct MemoryAdapter {
    state: RwLock<StoreState>,
    capacity: Option<usize>,
    max_bytes: Option<usize>,
    policy: EvictionPolicy,
}

impl MemoryAdapter {
    // == Constructor ==
    /// Creates an entry-count bounded store.
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Result<Self> {
        Self::builder().capacity(capacity).policy(policy).build()
    }

    pub fn builder() -> MemoryAdapterBuilder {
        MemoryAdapterBuilder::default()
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    fn overflows(&self, state: &StoreState, incoming: usize) -> bool {
        let over_count = self
            .capacity
            .map_or(false, |capacity| state.slots.len() >= capacity);
        let over_bytes = self
            .max_bytes
            .map_or(false, |max| state.total_bytes + incoming > max);
        over_count || over_bytes
    }

    /// Frees space for a new payload of `incoming` bytes. Stale entries go
    /// first, then one policy victim per iteration until the payload fits.
    fn make_room(&self, state: &mut StoreState, incoming: usize, now: DateTime<Utc>) {
        if !self.overflows(state, incoming) {
            return;
        }

        let purged = state.purge_expired(now);
        if purged > 0 {
            debug!("purged {} expired entries to make room", purged);
        }

        while self.overflows(state, incoming) {
            let Some(victim) = state.index.victim(self.policy) else {
                break;
            };
            state.remove(victim);
            state.evictions += 1;
            debug!("evicted {} ({})", victim, self.policy);
        }
    }

    // == Cleanup Expired ==
    /// Removes all entries stale at `now`; returns how many were removed.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.write().await;
        state.purge_expired(now)
    }

    // == Length ==
    pub async fn len(&self) -> usize {
        self.state.read().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.slots.is_empty()
    }

    pub async fn total_bytes(&self) -> usize {
        self.state.read().await.total_bytes
    }

    // == Stats ==
    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        StoreStats {
            entries: state.slots.len(),
            bytes: state.total_bytes,
            evictions: state.evictions,
            expirations: state.expirations,
            capacity: self.capacity,
            max_bytes: self.max_bytes,
            policy: self.policy.to_string(),
        }
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn get(&self, key: CacheKey) -> Option<Bytes> {
        let state = self.state.read().await;
        state.slots.get(&key).map(|slot| slot.payload.clone())
    }

    async fn set(&self, key: CacheKey, payload: Bytes, expiration: DateTime<Utc>) -> bool {
        // decoded outside the lock; only recency and frequency are kept
        let entry = decode(&payload);
        let mut state = self.state.write().await;

        if !state.slots.contains_key(&key) {
            if let Some(max) = self.max_bytes {
                if payload.len() > max {
                    debug!(
                        "payload for {} ({} bytes) exceeds byte budget {}, not stored",
                        key,
                        payload.len(),
                        max
                    );
                    return false;
                }
            }
            self.make_room(&mut state, payload.len(), Utc::now());
        }

        state.put(key, payload, &entry, expiration);
        true
    }

    async fn release(&self, key: CacheKey) {
        let mut state = self.state.write().await;
        state.remove(key);
    }

    async fn lookup(&self, key: CacheKey, now: DateTime<Utc>) -> Lookup {
        let mut state = self.state.write().await;

        let (mut entry, expiration) = match state.slots.get(&key) {
            Some(slot) => (decode(&slot.payload), slot.meta.expiration),
            None => return Lookup::Miss,
        };

        if !entry.is_fresh(now) {
            state.remove(key);
            state.expirations += 1;
            return Lookup::Expired;
        }

        entry.touch(now);
        match encode(&entry) {
            Ok(payload) => state.put(key, payload, &entry, expiration),
            Err(err) => debug!("failed to re-encode entry {}: {}", key, err),
        }
        Lookup::Hit(entry)
    }
}
