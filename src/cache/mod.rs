//! Cache Module
//!
//! Entry model and codec, request fingerprinting, eviction ordering and
//! interception statistics.

pub mod entry;
pub mod key;
mod policy;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{decode, encode, CacheEntry, HeaderField};
pub use key::{normalize_url, CacheKey, KeyGenerator};
pub use policy::{EntryMeta, EvictionIndex, EvictionPolicy};
pub use stats::{CacheCounters, CacheStats};

// == Public Constants ==
/// Default upper bound on a request body buffered for key computation
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024; // 1 MB

/// Status codes at or above this value are never stored
pub const ERROR_STATUS_THRESHOLD: u16 = 400;
