// ── Cache entry ──
//
// State for one cache key: the last value, fetch status, generation
// bookkeeping, the ordered listener list and the interest counters that
// gate eviction. Owned by `CacheStore`; every field is mutated under the
// slot mutex.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, Shared};
use serde::{Serialize, Serializer};
use serde_json::Value;
use strum::Display;
use tokio::time::Instant;

use crate::key::CacheKey;
use crate::registry::TagSet;

/// Fetch status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Created but never fetched.
    Idle,
    /// A fetch is in flight, or a tolerated `Unreachable` left the entry
    /// waiting for the device to come back.
    Loading,
    Success,
    Error,
}

/// Immutable view of a cache entry, shared by every listener of one transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySnapshot {
    pub key: CacheKey,
    pub status: EntryStatus,
    /// Last successfully fetched value. Kept while a refetch is loading and
    /// after a refetch fails.
    pub value: Option<Arc<Value>>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ootb_api::Error>,
    /// Generation of the most recently started fetch.
    pub generation: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub tags: TagSet,
}

#[allow(clippy::ref_option)]
fn serialize_error<S: Serializer>(
    error: &Option<ootb_api::Error>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.collect_str(e),
        None => serializer.serialize_none(),
    }
}

impl EntrySnapshot {
    /// The state of an entry that has never been fetched.
    pub(crate) fn unfetched(key: CacheKey, tags: TagSet) -> Self {
        Self {
            key,
            status: EntryStatus::Idle,
            value: None,
            error: None,
            generation: 0,
            fetched_at: None,
            tags,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == EntryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == EntryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == EntryStatus::Error
    }
}

/// Callback invoked synchronously on every transition of an entry.
///
/// Listeners run while the entry is locked. They must not call back into
/// the store for the same key; spawn a task if that is needed.
pub type Listener = Arc<dyn Fn(&Arc<EntrySnapshot>) + Send + Sync>;

pub(crate) type FetchResult = Result<Arc<Value>, ootb_api::Error>;
pub(crate) type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

pub(crate) struct InFlight {
    pub generation: u64,
    pub fetch: SharedFetch,
    /// Cleared when the last poll on the entry ends mid-fetch.
    pub tolerates_unreachable: bool,
}

pub(crate) struct CacheEntry {
    pub key: CacheKey,
    pub tags: TagSet,
    pub status: EntryStatus,
    pub value: Option<Arc<Value>>,
    pub error: Option<ootb_api::Error>,
    /// Unreachable result absorbed while polling; recorded as the error
    /// once no poll is left.
    pub deferred_error: Option<ootb_api::Error>,
    pub generation: u64,
    pub fetch_count: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    pub in_flight: Option<InFlight>,
    /// Registration order is notification order.
    pub listeners: Vec<(u64, Listener)>,
    pub active_polls: usize,
    /// Set whenever the last subscriber or poll lets go.
    pub idle_since: Option<Instant>,
    /// Set once the entry has been removed from the map; holders of a
    /// stale `Arc` must look the key up again.
    pub evicted: bool,
    snapshot: Arc<EntrySnapshot>,
}

impl CacheEntry {
    pub fn new(key: CacheKey, tags: TagSet, now: Instant) -> Self {
        let snapshot = Arc::new(EntrySnapshot::unfetched(key.clone(), tags));
        Self {
            key,
            tags,
            status: EntryStatus::Idle,
            value: None,
            error: None,
            deferred_error: None,
            generation: 0,
            fetch_count: 0,
            fetched_at: None,
            in_flight: None,
            listeners: Vec::new(),
            active_polls: 0,
            idle_since: Some(now),
            evicted: false,
            snapshot,
        }
    }

    pub fn snapshot(&self) -> Arc<EntrySnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn subscribers(&self) -> usize {
        self.listeners.len()
    }

    pub fn has_interest(&self) -> bool {
        !self.listeners.is_empty() || self.active_polls > 0
    }

    /// Start the idle clock if nobody is interested any more.
    pub fn mark_idle_if_unused(&mut self, now: Instant) {
        if !self.has_interest() && self.idle_since.is_none() {
            self.idle_since = Some(now);
        }
    }

    pub fn is_evictable(&self, now: Instant, threshold: Duration) -> bool {
        !self.evicted
            && !self.has_interest()
            && self
                .idle_since
                .is_some_and(|since| now.saturating_duration_since(since) >= threshold)
    }

    /// Rebuild the snapshot and notify every listener, in registration order.
    pub fn publish(&mut self) {
        let snapshot = Arc::new(EntrySnapshot {
            key: self.key.clone(),
            status: self.status,
            value: self.value.clone(),
            error: self.error.clone(),
            generation: self.generation,
            fetched_at: self.fetched_at,
            tags: self.tags,
        });
        self.snapshot = Arc::clone(&snapshot);
        for (_, listener) in &self.listeners {
            listener(&snapshot);
        }
    }
}
