// ── Idle eviction ──
//
// Background sweep that drops entries nobody has looked at for longer than
// the store's idle threshold.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::cache::CacheStore;

/// Spawn the sweeper. It stops when `cancel` fires.
pub fn spawn_eviction_task(
    store: CacheStore,
    sweep: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(eviction_task(store, sweep, cancel))
}

async fn eviction_task(store: CacheStore, sweep: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(sweep);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let evicted = store.evict_idle();
                trace!(evicted = evicted.len(), remaining = store.len(), "eviction sweep");
            }
        }
    }
    debug!("eviction task stopped");
}
