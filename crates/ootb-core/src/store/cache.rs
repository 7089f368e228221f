// ── Cache store ──
//
// Keyed storage of request results. Entries live in a `DashMap` of
// individually locked slots; each transition and its listener fan-out run
// under the slot lock, so transitions for one key are totally ordered.
// Fetches are `Shared` futures: joiners await the same request, and the
// future itself applies its result before any awaiter sees it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures_util::FutureExt;
use ootb_api::Transport;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::entry::{
    CacheEntry, EntrySnapshot, EntryStatus, FetchResult, InFlight, Listener, SharedFetch,
};
use super::subscription::{PollGuard, SubscriptionHandle};
use crate::key::CacheKey;
use crate::registry::{Registry, TagSet};

type Slot = Mutex<CacheEntry>;

/// How a read treats the cache and transport failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Start a new fetch even if a value is cached or a fetch is in flight.
    pub force_refetch: bool,
    /// An `Unreachable` result leaves the entry loading instead of recording
    /// an error. The caller still receives the error.
    pub tolerates_unreachable: bool,
}

impl ReadOptions {
    /// Serve from cache, join an in-flight fetch, or fetch on miss.
    pub fn cached() -> Self {
        Self::default()
    }

    /// Always hit the device.
    pub fn fresh() -> Self {
        Self {
            force_refetch: true,
            tolerates_unreachable: false,
        }
    }

    /// A poll tick: always hit the device, ride out reboots.
    pub fn polling() -> Self {
        Self {
            force_refetch: true,
            tolerates_unreachable: true,
        }
    }
}

/// Keyed cache of device reads.
///
/// Cheaply cloneable. Must be used from within a tokio runtime: fetches are
/// driven by spawned tasks.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    entries: DashMap<CacheKey, Arc<Slot>>,
    transport: Arc<dyn Transport>,
    registry: Registry,
    idle_threshold: Duration,
    /// Shared across keys so an evicted-then-recreated entry can never
    /// mistake a response from its previous life for a current one.
    generations: AtomicU64,
    listener_ids: AtomicU64,
}

enum Pending {
    Ready(FetchResult),
    Fetch(u64, SharedFetch),
}

impl CacheStore {
    pub fn new(transport: Arc<dyn Transport>, registry: Registry, idle_threshold: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: DashMap::new(),
                transport,
                registry,
                idle_threshold,
                generations: AtomicU64::new(0),
                listener_ids: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn idle_threshold(&self) -> Duration {
        self.inner.idle_threshold
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Return the entry for `key`, creating it and starting a fetch on miss.
    ///
    /// Idempotent while a fetch is in flight: concurrent calls share it. An
    /// entry in `error` (or left loading by a tolerated `Unreachable`) is
    /// fetched again; a `success` entry is a plain cache hit.
    pub fn get(&self, key: &CacheKey) -> Arc<EntrySnapshot> {
        self.with_entry(key, |entry| {
            if entry.in_flight.is_some() {
                trace!(%key, "fetch already in flight, sharing it");
            } else if entry.status != EntryStatus::Success {
                self.start_fetch(entry, false);
            }
            entry.snapshot()
        })
    }

    /// Await a value for `key` according to `options`.
    ///
    /// If the awaited fetch is superseded by a newer generation before it
    /// lands, the newer outcome is returned instead.
    pub async fn read(&self, key: &CacheKey, options: ReadOptions) -> FetchResult {
        let mut pending = self.with_entry(key, |entry| {
            if !options.force_refetch {
                if let Some(in_flight) = &entry.in_flight {
                    debug!(%key, generation = in_flight.generation, "joining in-flight fetch");
                    return Pending::Fetch(in_flight.generation, in_flight.fetch.clone());
                }
                if entry.status == EntryStatus::Success {
                    if let Some(value) = &entry.value {
                        return Pending::Ready(Ok(Arc::clone(value)));
                    }
                }
            }
            let fetch = self.start_fetch(entry, options.tolerates_unreachable);
            Pending::Fetch(entry.generation, fetch)
        });

        loop {
            match pending {
                Pending::Ready(result) => return result,
                Pending::Fetch(generation, fetch) => {
                    let result = fetch.await;
                    match self.superseding(key, generation) {
                        Some(newer) => pending = newer,
                        None => return result,
                    }
                }
            }
        }
    }

    /// Start a new fetch regardless of status, bumping the generation.
    ///
    /// Returns the new generation. Any older fetch still in flight for the
    /// key will be discarded when it lands.
    pub fn force_refetch(&self, key: &CacheKey) -> u64 {
        self.with_entry(key, |entry| {
            self.start_fetch(entry, false);
            entry.generation
        })
    }

    /// Register `listener`, deliver the current snapshot to it synchronously,
    /// and count it as a subscriber until the returned handle is dropped.
    pub fn subscribe(&self, key: &CacheKey, listener: Listener) -> SubscriptionHandle {
        self.register(key, listener, false)
    }

    /// [`subscribe`](Self::subscribe), then fetch as [`get`](Self::get)
    /// would, all under one hold of the entry.
    pub fn subscribe_and_fetch(&self, key: &CacheKey, listener: Listener) -> SubscriptionHandle {
        self.register(key, listener, true)
    }

    /// Remove entries nobody has used for longer than the idle threshold.
    ///
    /// Entries with subscribers or an active poll are never removed. Returns
    /// the evicted keys.
    pub fn evict_idle(&self) -> Vec<CacheKey> {
        let now = Instant::now();
        let threshold = self.inner.idle_threshold;
        let mut evicted = Vec::new();

        self.inner.entries.retain(|key, slot| {
            let mut entry = match slot.try_lock() {
                Ok(entry) => entry,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                // Busy means someone is using it right now.
                Err(TryLockError::WouldBlock) => return true,
            };
            if entry.is_evictable(now, threshold) {
                entry.evicted = true;
                evicted.push(key.clone());
                false
            } else {
                true
            }
        });

        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted idle cache entries");
        }
        evicted
    }

    // ── Inspection ───────────────────────────────────────────────────

    /// Current snapshot without creating the entry or fetching.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<EntrySnapshot>> {
        let slot = self.slot(key)?;
        let entry = lock(&slot);
        (!entry.evicted).then(|| entry.snapshot())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.slot(key).map_or(0, |slot| lock(&slot).subscribers())
    }

    /// Number of fetches started for `key` since the entry was created.
    pub fn fetch_count(&self, key: &CacheKey) -> u64 {
        self.slot(key).map_or(0, |slot| lock(&slot).fetch_count)
    }

    /// Keys of every entry whose tag set intersects `tags`.
    pub fn keys_tagged(&self, tags: TagSet) -> Vec<CacheKey> {
        // Collect first so no shard lock is held while slots are locked.
        let slots: Vec<(CacheKey, Arc<Slot>)> = self
            .inner
            .entries
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();

        let mut keys: Vec<CacheKey> = slots
            .into_iter()
            .filter(|(_, slot)| {
                let entry = lock(slot);
                !entry.evicted && !entry.tags.is_disjoint(tags)
            })
            .map(|(key, _)| key)
            .collect();
        keys.sort();
        keys
    }

    // ── Crate-internal hooks ─────────────────────────────────────────

    /// Hold the entry open for the duration of a poll.
    pub(crate) fn begin_poll(&self, key: &CacheKey) -> PollGuard {
        self.with_entry(key, |entry| {
            entry.active_polls += 1;
            entry.idle_since = None;
        });
        PollGuard::new(self.downgrade(), key.clone())
    }

    pub(crate) fn end_poll(&self, key: &CacheKey) {
        let Some(slot) = self.slot(key) else { return };
        let mut entry = lock(&slot);
        entry.active_polls = entry.active_polls.saturating_sub(1);
        if entry.active_polls == 0 && !entry.evicted {
            if let Some(in_flight) = entry.in_flight.as_mut() {
                // Whatever this fetch returns is no longer ridden out.
                in_flight.tolerates_unreachable = false;
            } else if entry.status == EntryStatus::Loading {
                if let Some(err) = entry.deferred_error.take() {
                    debug!(%key, "poll ended with the device unreachable");
                    record_error(&mut entry, err);
                    entry.publish();
                }
            }
        }
        entry.mark_idle_if_unused(Instant::now());
    }

    pub(crate) fn unsubscribe(&self, key: &CacheKey, id: u64) {
        if let Some(slot) = self.slot(key) {
            let mut entry = lock(&slot);
            entry.listeners.retain(|(listener_id, _)| *listener_id != id);
            entry.mark_idle_if_unused(Instant::now());
            debug!(%key, subscribers = entry.subscribers(), "unsubscribed");
        }
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn register(&self, key: &CacheKey, listener: Listener, fetch: bool) -> SubscriptionHandle {
        let id = self.inner.listener_ids.fetch_add(1, Ordering::Relaxed);
        self.with_entry(key, |entry| {
            listener(&entry.snapshot());
            entry.listeners.push((id, listener));
            entry.idle_since = None;
            debug!(%key, subscribers = entry.subscribers(), "subscribed");
            if fetch && entry.in_flight.is_none() && entry.status != EntryStatus::Success {
                self.start_fetch(entry, false);
            }
        });
        SubscriptionHandle::new(self.downgrade(), key.clone(), id)
    }

    /// What a reader of `generation` should wait for instead, if a newer
    /// generation has replaced it.
    fn superseding(&self, key: &CacheKey, generation: u64) -> Option<Pending> {
        let slot = self.slot(key)?;
        let entry = lock(&slot);
        if entry.evicted || entry.generation == generation {
            return None;
        }
        if let Some(in_flight) = &entry.in_flight {
            trace!(%key, generation, current = in_flight.generation, "following newer fetch");
            return Some(Pending::Fetch(in_flight.generation, in_flight.fetch.clone()));
        }
        match (entry.status, &entry.value, &entry.error) {
            (EntryStatus::Success, Some(value), _) => Some(Pending::Ready(Ok(Arc::clone(value)))),
            (EntryStatus::Error, _, Some(err)) => Some(Pending::Ready(Err(err.clone()))),
            _ => None,
        }
    }

    fn slot(&self, key: &CacheKey) -> Option<Arc<Slot>> {
        self.inner.entries.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Run `f` on the live entry for `key`, creating it if needed.
    fn with_entry<R>(&self, key: &CacheKey, f: impl FnOnce(&mut CacheEntry) -> R) -> R {
        loop {
            let slot = {
                let r = self.inner.entries.entry(key.clone()).or_insert_with(|| {
                    let tags = self.inner.registry.tags(key.resource());
                    Arc::new(Mutex::new(CacheEntry::new(key.clone(), tags, Instant::now())))
                });
                Arc::clone(r.value())
            };
            let mut entry = lock(&slot);
            if entry.evicted {
                // Lost a race with eviction; the next lookup creates a fresh entry.
                continue;
            }
            return f(&mut entry);
        }
    }

    /// Begin a new generation for `entry` and spawn its driver.
    fn start_fetch(&self, entry: &mut CacheEntry, tolerates_unreachable: bool) -> SharedFetch {
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let key = entry.key.clone();
        let request = key.request();
        let transport = Arc::clone(&self.inner.transport);
        let store = self.downgrade();

        let fetch = async move {
            let result = transport.request(request).await.map(Arc::new);
            if let Some(inner) = store.upgrade() {
                CacheStore::from_inner(inner).settle(&key, generation, &result);
            }
            result
        }
        .boxed()
        .shared();

        entry.generation = generation;
        entry.fetch_count += 1;
        entry.status = EntryStatus::Loading;
        entry.in_flight = Some(InFlight {
            generation,
            fetch: fetch.clone(),
            tolerates_unreachable,
        });
        debug!(key = %entry.key, generation, "fetch started");
        entry.publish();

        // The fetch runs to completion even if every reader goes away.
        let driver = fetch.clone();
        tokio::spawn(async move {
            let _ = driver.await;
        });

        fetch
    }

    /// Apply a landed response if it still belongs to the newest generation.
    fn settle(&self, key: &CacheKey, generation: u64, result: &FetchResult) {
        let Some(slot) = self.slot(key) else {
            trace!(%key, generation, "entry evicted, response discarded");
            return;
        };
        let mut entry = lock(&slot);
        if entry.evicted || entry.generation != generation {
            trace!(%key, generation, current = entry.generation, "stale generation, response discarded");
            return;
        }
        let tolerates_unreachable = entry
            .in_flight
            .take()
            .is_some_and(|in_flight| in_flight.tolerates_unreachable);

        match result {
            Ok(value) => {
                entry.status = EntryStatus::Success;
                entry.value = Some(Arc::clone(value));
                entry.error = None;
                entry.deferred_error = None;
                entry.fetched_at = Some(Utc::now());
            }
            Err(err) if tolerates_unreachable && err.is_unreachable() => {
                debug!(%key, generation, "device unreachable, entry stays loading");
                entry.deferred_error = Some(err.clone());
                return;
            }
            Err(err) => record_error(&mut entry, err.clone()),
        }
        debug!(%key, generation, status = %entry.status, "fetch settled");
        entry.publish();
    }
}

fn lock(slot: &Slot) -> MutexGuard<'_, CacheEntry> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record_error(entry: &mut CacheEntry, err: ootb_api::Error) {
    entry.status = EntryStatus::Error;
    entry.error = Some(err);
    entry.deferred_error = None;
    entry.fetched_at = Some(Utc::now());
}
