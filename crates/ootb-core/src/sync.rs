// ── DeviceSync facade ──
//
// The consumer-facing surface: live resource views, mutations that
// invalidate what they change, and poll sessions for long-running device
// operations. Owns the cache store and its background sweeper.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ootb_api::{DeviceClient, Request, StartFirmwareUpdate, Transport};

use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::invalidation::InvalidationEngine;
use crate::key::CacheKey;
use crate::poll::{
    PollConfig, PollHandle, Poller, StopPredicate, firmware_update_predicate,
    scan_complete_predicate,
};
use crate::registry::{Mutation, Registry, Resource};
use crate::store::{CacheStore, ReadOptions, spawn_eviction_task};
use crate::stream::ResourceView;

/// Result of a successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    /// The device's response body; `Null` for an empty ack.
    pub ack: Value,
    /// Cache keys refetched because of the write.
    pub invalidated: Vec<CacheKey>,
}

/// Main entry point for talking to one device.
///
/// Cheaply cloneable via `Arc<DeviceSyncInner>`.
#[derive(Clone)]
pub struct DeviceSync {
    inner: Arc<DeviceSyncInner>,
}

struct DeviceSyncInner {
    config: SyncConfig,
    transport: Arc<dyn Transport>,
    store: CacheStore,
    invalidation: InvalidationEngine,
    poller: Poller,
    cancel: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceSync {
    /// Build the HTTP transport from `config` and start the engine.
    pub fn connect(config: SyncConfig) -> Result<Self, CoreError> {
        let client = DeviceClient::new(config.base_url.clone(), &config.transport())?;
        info!(device = %config.base_url, "device sync ready");
        Self::with_transport(config, Arc::new(client))
    }

    /// Start the engine over any transport.
    ///
    /// Must be called inside a tokio runtime when the eviction sweep is enabled.
    pub fn with_transport(
        config: SyncConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, CoreError> {
        let registry = Registry::validated()?;
        let store = CacheStore::new(Arc::clone(&transport), registry, config.idle_eviction);
        let cancel = CancellationToken::new();

        let sweeper = (!config.eviction_sweep.is_zero()).then(|| {
            spawn_eviction_task(store.clone(), config.eviction_sweep, cancel.child_token())
        });

        Ok(Self {
            inner: Arc::new(DeviceSyncInner {
                invalidation: InvalidationEngine::new(store.clone()),
                poller: Poller::with_cancel(store.clone(), cancel.child_token()),
                config,
                transport,
                store,
                cancel,
                sweeper: Mutex::new(sweeper),
            }),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Live view of `resource` read with `arg` (`Value::Null` for none).
    pub fn use_resource(&self, resource: Resource, arg: &Value) -> Result<ResourceView, CoreError> {
        let key = CacheKey::new(resource, arg)?;
        Ok(ResourceView::open(&self.inner.store, &key))
    }

    /// One-shot read through the cache.
    ///
    /// Unlike subscriptions, this returns the transport error directly.
    pub async fn read(
        &self,
        resource: Resource,
        arg: &Value,
        options: ReadOptions,
    ) -> Result<Arc<Value>, CoreError> {
        let key = CacheKey::new(resource, arg)?;
        Ok(self.inner.store.read(&key, options).await?)
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Run `mutation` and, once the device accepts it, refetch every entry
    /// it invalidates. A failed write invalidates nothing.
    pub async fn mutate(&self, mutation: Mutation, body: Value) -> Result<MutationOutcome, CoreError> {
        let desc = self.inner.store.registry().mutation(mutation);
        let request = Request {
            method: desc.method,
            path: desc.path.to_owned(),
            query: Vec::new(),
            body: Some(body),
        };
        debug!(%mutation, method = %desc.method, path = desc.path, "running mutation");

        let ack = match self.inner.transport.request(request).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!(%mutation, error = %e, "mutation failed, nothing invalidated");
                return Err(e.into());
            }
        };

        let invalidated = self.inner.invalidation.after_mutation(mutation);
        Ok(MutationOutcome { ack, invalidated })
    }

    /// A reusable trigger for `mutation` with observable status.
    pub fn use_mutation(&self, mutation: Mutation) -> MutationHandle {
        let (status, _) = watch::channel(MutationStatus::Idle);
        MutationHandle {
            sync: self.clone(),
            mutation,
            status,
        }
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// Poll `resource` until `predicate` reports a terminal status.
    pub fn poll(
        &self,
        resource: Resource,
        arg: &Value,
        config: PollConfig,
        predicate: impl StopPredicate + 'static,
    ) -> Result<PollHandle, CoreError> {
        let key = CacheKey::new(resource, arg)?;
        Ok(self.inner.poller.start(key, config, predicate))
    }

    /// Ask the device to scan for wireless networks and poll for the results.
    pub async fn scan_networks(&self, interface: Option<&str>) -> Result<PollHandle, CoreError> {
        let arg = interface.map_or(Value::Null, |i| serde_json::json!({ "interface": i }));
        // Validate before writing anything.
        let key = CacheKey::new(Resource::Networks, &arg)?;
        let body = if arg.is_null() { serde_json::json!({}) } else { arg };
        self.mutate(Mutation::ScanNetworks, body).await?;
        Ok(self.inner.poller.start(
            key,
            self.inner.config.network_scan_poll,
            scan_complete_predicate(),
        ))
    }

    /// Start a firmware update and poll its progress to completion.
    pub async fn start_firmware_update(
        &self,
        update: &StartFirmwareUpdate,
    ) -> Result<PollHandle, CoreError> {
        let body = serde_json::to_value(update).map_err(|e| CoreError::InvalidArgument {
            resource: Resource::FirmwareUpdate,
            reason: e.to_string(),
        })?;
        self.mutate(Mutation::StartFirmwareUpdate, body).await?;
        Ok(self.inner.poller.start(
            CacheKey::bare(Resource::FirmwareUpdate),
            self.inner.config.firmware_update_poll,
            firmware_update_predicate(),
        ))
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Stop the eviction sweeper and cancel every live poll.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self.inner.sweeper.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        debug!("device sync shut down");
    }
}

/// Status of a mutation trigger.
#[derive(Debug, Clone)]
pub enum MutationStatus {
    Idle,
    Pending,
    Succeeded(MutationOutcome),
    Failed(CoreError),
}

/// Trigger for one mutation, bound to a `DeviceSync`.
pub struct MutationHandle {
    sync: DeviceSync,
    mutation: Mutation,
    status: watch::Sender<MutationStatus>,
}

impl MutationHandle {
    pub fn mutation(&self) -> Mutation {
        self.mutation
    }

    pub fn status(&self) -> MutationStatus {
        self.status.borrow().clone()
    }

    /// Observe status transitions.
    pub fn watch(&self) -> watch::Receiver<MutationStatus> {
        self.status.subscribe()
    }

    /// Run the mutation with `body`, publishing `Pending` then the outcome.
    pub async fn trigger(&self, body: Value) -> Result<MutationOutcome, CoreError> {
        self.status.send_replace(MutationStatus::Pending);
        let result = self.sync.mutate(self.mutation, body).await;
        self.status.send_replace(match &result {
            Ok(outcome) => MutationStatus::Succeeded(outcome.clone()),
            Err(e) => MutationStatus::Failed(e.clone()),
        });
        result
    }
}
