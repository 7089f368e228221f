// ── Reactive resource views ──
//
// A `ResourceView` is a live subscription to one cache key. It projects the
// entry's snapshots into a `watch` channel so consumers can either poll the
// latest state or await changes.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::key::CacheKey;
use crate::store::{CacheStore, EntrySnapshot, SubscriptionHandle};

/// A subscription to one resource. Dropping it unsubscribes.
pub struct ResourceView {
    current: Arc<EntrySnapshot>,
    receiver: watch::Receiver<Arc<EntrySnapshot>>,
    subscription: SubscriptionHandle,
}

impl ResourceView {
    /// Subscribe to `key`, starting a fetch if the entry is cold.
    pub(crate) fn open(store: &CacheStore, key: &CacheKey) -> Self {
        let unfetched = EntrySnapshot::unfetched(key.clone(), store.registry().tags(key.resource()));
        let (sender, mut receiver) = watch::channel(Arc::new(unfetched));
        let subscription = store.subscribe_and_fetch(
            key,
            Arc::new(move |snapshot: &Arc<EntrySnapshot>| {
                sender.send_replace(Arc::clone(snapshot));
            }),
        );
        let current = receiver.borrow_and_update().clone();
        Self {
            current,
            receiver,
            subscription,
        }
    }

    pub fn key(&self) -> &CacheKey {
        self.subscription.key()
    }

    /// The snapshot as of the last `changed()` (or of subscription time).
    pub fn current(&self) -> &Arc<EntrySnapshot> {
        &self.current
    }

    /// Wait for the next transition. Returns `None` once the entry is gone.
    pub async fn changed(&mut self) -> Option<Arc<EntrySnapshot>> {
        self.receiver.changed().await.ok()?;
        let snapshot = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snapshot);
        Some(snapshot)
    }

    /// Convert into a `Stream` of snapshots, starting with the latest one.
    pub fn into_stream(self) -> ResourceWatchStream {
        ResourceWatchStream {
            inner: WatchStream::new(self.receiver),
            _subscription: self.subscription,
        }
    }
}

impl std::fmt::Debug for ResourceView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceView")
            .field("key", self.key())
            .field("status", &self.current.status)
            .finish_non_exhaustive()
    }
}

/// `Stream` adapter over a resource view. Holds the subscription open.
pub struct ResourceWatchStream {
    inner: WatchStream<Arc<EntrySnapshot>>,
    _subscription: SubscriptionHandle,
}

impl Stream for ResourceWatchStream {
    type Item = Arc<EntrySnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
