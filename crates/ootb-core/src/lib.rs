// ootb-core: Request cache, tag invalidation and polling between ootb-api and consumers.

pub mod config;
pub mod error;
pub mod invalidation;
pub mod key;
pub mod poll;
pub mod registry;
pub mod store;
pub mod stream;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::SyncConfig;
pub use error::CoreError;
pub use invalidation::InvalidationEngine;
pub use key::{CacheKey, NormalizedArg};
pub use poll::{
    PollConfig, PollHandle, PollState, PollVerdict, Poller, StatusPredicate, StopPredicate,
    firmware_update_predicate, scan_complete_predicate,
};
pub use registry::{Mutation, MutationDescriptor, Registry, Resource, ResourceDescriptor, Tag, TagSet};
pub use store::{CacheStore, EntrySnapshot, EntryStatus, Listener, ReadOptions, SubscriptionHandle};
pub use stream::{ResourceView, ResourceWatchStream};
pub use sync::{DeviceSync, MutationHandle, MutationOutcome, MutationStatus};
