//! Expiry Purge Task
//!
//! Background task that periodically removes stale entries from the
//! in-memory store, so memory is reclaimed even for keys nobody requests again.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::adapter::MemoryAdapter;

/// Spawns a task that purges expired entries every `cleanup_interval_secs`.
///
/// The returned handle is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let store = Arc::new(MemoryAdapter::new(1000, EvictionPolicy::Lru)?);
/// let cleanup_handle = spawn_cleanup_task(store.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(
    store: Arc<MemoryAdapter>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiry purge task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.cleanup_expired(Utc::now()).await;

            if removed > 0 {
                info!("Expiry purge: removed {} stale entries", removed);
            } else {
                debug!("Expiry purge: no stale entries found");
            }
        }
    })
}
