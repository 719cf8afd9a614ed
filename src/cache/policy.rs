//! Eviction Policy Module
//!
//! Ordered indexes over entry metadata so that choosing an eviction victim
//! never requires decoding or scanning the whole store.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::cache::CacheKey;
use crate::error::CacheError;

// == Eviction Policy ==
/// Strategy used to pick the entry removed when the store is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionPolicy {
    /// Least recently used
    Lru,
    /// Most recently used
    Mru,
    /// Least frequently used
    Lfu,
    /// Most frequently used
    Mfu,
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LRU" => Ok(EvictionPolicy::Lru),
            "MRU" => Ok(EvictionPolicy::Mru),
            "LFU" => Ok(EvictionPolicy::Lfu),
            "MFU" => Ok(EvictionPolicy::Mfu),
            _ => Err(CacheError::UnknownPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EvictionPolicy::Lru => "LRU",
            EvictionPolicy::Mru => "MRU",
            EvictionPolicy::Lfu => "LFU",
            EvictionPolicy::Mfu => "MFU",
        };
        f.write_str(label)
    }
}

// == Entry Metadata ==
/// The subset of an entry the indexes order by.
///
/// `seq` is the insertion sequence of the key; it stays fixed across
/// overwrites and breaks ties between equal metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub last_access: DateTime<Utc>,
    pub frequency: u64,
    pub expiration: DateTime<Utc>,
    pub seq: u64,
}

// == Eviction Index ==
/// Tracks every stored key by recency, frequency and expiration.
///
/// - LRU: smallest (last_access, seq), so the earliest-inserted wins ties
/// - MRU: largest (last_access, seq), so the latest-inserted wins ties
/// - LFU: smallest (frequency, seq)
/// - MFU: largest (frequency, seq)
#[derive(Debug, Default)]
pub struct EvictionIndex {
    by_access: BTreeSet<(DateTime<Utc>, u64, CacheKey)>,
    by_frequency: BTreeSet<(u64, u64, CacheKey)>,
    by_expiration: BTreeSet<(DateTime<Utc>, u64, CacheKey)>,
}

impl EvictionIndex {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Adds a key. Callers remove the old metadata first when overwriting.
    pub fn insert(&mut self, key: CacheKey, meta: &EntryMeta) {
        self.by_access.insert((meta.last_access, meta.seq, key));
        self.by_frequency.insert((meta.frequency, meta.seq, key));
        self.by_expiration.insert((meta.expiration, meta.seq, key));
    }

    // == Remove ==
    pub fn remove(&mut self, key: CacheKey, meta: &EntryMeta) {
        self.by_access.remove(&(meta.last_access, meta.seq, key));
        self.by_frequency.remove(&(meta.frequency, meta.seq, key));
        self.by_expiration.remove(&(meta.expiration, meta.seq, key));
    }

    // == Select Victim ==
    /// Returns the key the policy would evict, without removing it.
    pub fn victim(&self, policy: EvictionPolicy) -> Option<CacheKey> {
        match policy {
            EvictionPolicy::Lru => self.by_access.first().map(|(_, _, key)| *key),
            EvictionPolicy::Mru => self.by_access.last().map(|(_, _, key)| *key),
            EvictionPolicy::Lfu => self.by_frequency.first().map(|(_, _, key)| *key),
            EvictionPolicy::Mfu => self.by_frequency.last().map(|(_, _, key)| *key),
        }
    }

    // == Expired Keys ==
    /// Keys whose expiration is at or before `now`, soonest first.
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<CacheKey> {
        self.by_expiration
            .iter()
            .take_while(|(expiration, _, _)| *expiration <= now)
            .map(|(_, _, key)| *key)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_access.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_access.is_empty()
    }
}
