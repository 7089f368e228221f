// ── Interest handles ──
//
// RAII handles that keep a cache entry alive. Dropping a handle releases
// the interest; once nothing is left the entry starts its idle clock.

use std::sync::Weak;

use super::cache::{CacheStore, StoreInner};
use crate::key::CacheKey;

/// A registered listener. Dropping it unsubscribes.
#[must_use = "dropping the handle unsubscribes immediately"]
pub struct SubscriptionHandle {
    store: Weak<StoreInner>,
    key: CacheKey,
    id: u64,
}

impl SubscriptionHandle {
    pub(crate) fn new(store: Weak<StoreInner>, key: CacheKey, id: u64) -> Self {
        Self { store, key, id }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            CacheStore::from_inner(inner).unsubscribe(&self.key, self.id);
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Marks an entry as being polled; it can't be evicted while this lives.
pub(crate) struct PollGuard {
    store: Weak<StoreInner>,
    key: CacheKey,
}

impl PollGuard {
    pub(crate) fn new(store: Weak<StoreInner>, key: CacheKey) -> Self {
        Self { store, key }
    }
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            CacheStore::from_inner(inner).end_poll(&self.key);
        }
    }
}
