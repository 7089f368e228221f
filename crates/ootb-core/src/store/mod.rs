// ── Request cache ──
//
// Keyed entries with generation-guarded fetches, ordered listeners, and
// idle eviction.

mod cache;
mod entry;
mod eviction;
mod subscription;

pub use cache::{CacheStore, ReadOptions};
pub use entry::{EntrySnapshot, EntryStatus, Listener};
pub use eviction::spawn_eviction_task;
pub use subscription::SubscriptionHandle;

pub(crate) use subscription::PollGuard;
