// ── Tag invalidation ──
//
// After a successful mutation, every cache entry whose tags intersect the
// mutation's invalidation set is refetched. Entries are refetched, never
// dropped: subscribers keep seeing the previous value until the new one
// lands.

use tracing::{debug, info};

use crate::key::CacheKey;
use crate::registry::{Mutation, TagSet};
use crate::store::CacheStore;

/// Drives refetches for tag sets.
#[derive(Clone)]
pub struct InvalidationEngine {
    store: CacheStore,
}

impl InvalidationEngine {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    /// Refetch every live entry tagged with any of `tags`.
    ///
    /// Returns the keys that were refetched, sorted.
    pub fn invalidate(&self, tags: TagSet) -> Vec<CacheKey> {
        if tags.is_empty() {
            return Vec::new();
        }
        let keys = self.store.keys_tagged(tags);
        for key in &keys {
            let generation = self.store.force_refetch(key);
            debug!(%key, generation, "invalidated");
        }
        info!(tags = ?tags, refetched = keys.len(), "cache invalidated");
        keys
    }

    /// Invalidate whatever `mutation` declares it changes.
    pub fn after_mutation(&self, mutation: Mutation) -> Vec<CacheKey> {
        let tags = self.store.registry().mutation(mutation).invalidates;
        debug!(%mutation, "invalidating after mutation");
        self.invalidate(tags)
    }
}
