//! Redis Adapter
//!
//! Remote store backed by one Redis server or a ring of them. Expiry is
//! delegated to Redis (`PSETEX` with the remaining lifetime); Redis's own
//! memory policy replaces the in-process eviction policies. Backend failures
//! are logged and read as a miss or a no-op.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{info, warn};

use super::Adapter;
use crate::cache::CacheKey;
use crate::error::{CacheError, Result};

const KEY_PREFIX: &str = "http-cache:";

/// Adapter over multiplexed, auto-reconnecting Redis connections.
///
/// With several nodes, each key lives on exactly one shard, chosen from the
/// key's fingerprint. Adding or removing a node remaps most keys, which
/// only costs cache misses.
#[derive(Clone)]
pub struct RedisAdapter {
    shards: Vec<ConnectionManager>,
}

impl RedisAdapter {
    /// Connects to a single server at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_ring([url]).await
    }

    /// Connects to every node of a sharded ring.
    pub async fn connect_ring<I, S>(urls: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut shards = Vec::new();
        for url in urls {
            let url = url.as_ref();
            let client =
                redis::Client::open(url).map_err(|err| CacheError::Backend(err.to_string()))?;
            let connection = client
                .get_connection_manager()
                .await
                .map_err(|err| CacheError::Backend(err.to_string()))?;
            shards.push(connection);
        }

        if shards.is_empty() {
            return Err(CacheError::Backend("redis ring has no nodes".to_string()));
        }
        info!("connected to {} redis node(s)", shards.len());
        Ok(Self { shards })
    }

    fn redis_key(key: CacheKey) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }

    fn shard(&self, key: CacheKey) -> ConnectionManager {
        self.shards[shard_index(key, self.shards.len())].clone()
    }
}

/// Shard owning `key` in a ring of `nodes` (non-zero) nodes.
fn shard_index(key: CacheKey, nodes: usize) -> usize {
    (key.0 % nodes as u64) as usize
}

/// Milliseconds from `now` until `expiration`, or `None` when already stale.
fn remaining_millis(expiration: DateTime<Utc>, now: DateTime<Utc>) -> Option<u64> {
    let remaining = (expiration - now).num_milliseconds();
    u64::try_from(remaining).ok().filter(|ms| *ms > 0)
}

#[async_trait]
impl Adapter for RedisAdapter {
    async fn get(&self, key: CacheKey) -> Option<Bytes> {
        let mut connection = self.shard(key);
        match connection.get::<_, Option<Vec<u8>>>(Self::redis_key(key)).await {
            Ok(payload) => payload.map(Bytes::from),
            Err(err) => {
                warn!("redis GET {} failed: {}", key, err);
                None
            }
        }
    }

    async fn set(&self, key: CacheKey, payload: Bytes, expiration: DateTime<Utc>) -> bool {
        let Some(ttl_ms) = remaining_millis(expiration, Utc::now()) else {
            return false;
        };

        let mut connection = self.shard(key);
        let result: redis::RedisResult<()> = connection
            .pset_ex(Self::redis_key(key), payload.as_ref(), ttl_ms)
            .await;
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!("redis PSETEX {} failed: {}", key, err);
                false
            }
        }
    }

    async fn release(&self, key: CacheKey) {
        let mut connection = self.shard(key);
        let result: redis::RedisResult<()> = connection.del(Self::redis_key(key)).await;
        if let Err(err) = result {
            warn!("redis DEL {} failed: {}", key, err);
        }
    }
}
