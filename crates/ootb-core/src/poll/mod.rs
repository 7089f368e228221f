// ── Poller ──
//
// Repeats a read at a fixed interval until a stop predicate says the
// operation is finished, the ceiling elapses, or the caller cancels. Each
// tick reads through the cache store with `ReadOptions::polling()`, so a
// device that is rebooting (`Unreachable`) keeps the session alive.

mod predicate;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::key::CacheKey;
use crate::store::{CacheStore, PollGuard, ReadOptions};

pub use predicate::{
    PollVerdict, StatusPredicate, StopPredicate, firmware_update_predicate,
    scan_complete_predicate,
};

/// Cadence and ceiling of one poll session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// The session times out once this much time has passed since it started.
    pub max_duration: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, max_duration: Duration) -> Self {
        Self {
            interval,
            max_duration,
        }
    }

    /// Network scan: results arrive within seconds.
    pub fn network_scan() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(60))
    }

    /// Firmware update: download, verify, install and reboot.
    pub fn firmware_update() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(15 * 60))
    }
}

/// Observable state of a poll session.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Idle,
    Polling {
        reads: u32,
        /// Latest response, if any tick has succeeded yet.
        last: Option<Arc<Value>>,
    },
    Succeeded {
        reads: u32,
        value: Arc<Value>,
    },
    Failed {
        reads: u32,
        /// The terminal response, absent when a read error ended the session.
        last: Option<Arc<Value>>,
        message: String,
    },
    TimedOut {
        reads: u32,
        elapsed: Duration,
        last: Option<Arc<Value>>,
    },
    Cancelled {
        reads: u32,
    },
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Idle | Self::Polling { .. })
    }

    /// Number of reads issued so far.
    pub fn reads(&self) -> u32 {
        match self {
            Self::Idle => 0,
            Self::Polling { reads, .. }
            | Self::Succeeded { reads, .. }
            | Self::Failed { reads, .. }
            | Self::TimedOut { reads, .. }
            | Self::Cancelled { reads } => *reads,
        }
    }

    /// Convert a terminal state into the final value or an error.
    pub fn into_result(self) -> Result<Arc<Value>, CoreError> {
        match self {
            Self::Succeeded { value, .. } => Ok(value),
            Self::Failed { message, .. } => Err(CoreError::PollFailed { message }),
            Self::TimedOut { elapsed, .. } => Err(CoreError::PollTimedOut { elapsed }),
            Self::Idle | Self::Polling { .. } | Self::Cancelled { .. } => {
                Err(CoreError::PollCancelled)
            }
        }
    }
}

/// Starts poll sessions against a cache store.
#[derive(Clone)]
pub struct Poller {
    store: CacheStore,
    /// Parent of every session's token.
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(store: CacheStore) -> Self {
        Self::with_cancel(store, CancellationToken::new())
    }

    /// Sessions are cancelled when `cancel` fires.
    pub fn with_cancel(store: CacheStore, cancel: CancellationToken) -> Self {
        Self { store, cancel }
    }

    /// Cancel every session started by this poller.
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    /// Spawn a poll session for `key`. The first read is issued immediately.
    pub fn start(
        &self,
        key: CacheKey,
        config: PollConfig,
        predicate: impl StopPredicate + 'static,
    ) -> PollHandle {
        let (tx, rx) = watch::channel(PollState::Idle);
        let cancel = self.cancel.child_token();
        let session = PollSession {
            _guard: self.store.begin_poll(&key),
            store: self.store.clone(),
            key,
            config,
            predicate: Box::new(predicate),
            state: tx,
        };
        tokio::spawn(session.run(cancel.clone()));
        PollHandle { state: rx, cancel }
    }
}

/// Caller's side of a running poll. Dropping it cancels the session.
pub struct PollHandle {
    state: watch::Receiver<PollState>,
    cancel: CancellationToken,
}

impl PollHandle {
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Wait for the next state change.
    pub async fn changed(&mut self) -> Option<PollState> {
        self.state.changed().await.ok()?;
        Some(self.state.borrow_and_update().clone())
    }

    /// Stop the session. Takes effect at the next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait until the session reaches a terminal state.
    pub async fn wait(mut self) -> PollState {
        let terminal = self
            .state
            .wait_for(PollState::is_terminal)
            .await
            .map(|state| PollState::clone(&state));
        // An error means the session task is gone without publishing a terminal state.
        terminal.unwrap_or_else(|_| PollState::Cancelled {
            reads: self.state.borrow().reads(),
        })
    }

    /// Wait for the session and convert its outcome.
    pub async fn into_result(self) -> Result<Arc<Value>, CoreError> {
        self.wait().await.into_result()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct PollSession {
    /// Keeps the entry from being evicted while the session runs.
    _guard: PollGuard,
    store: CacheStore,
    key: CacheKey,
    config: PollConfig,
    predicate: Box<dyn StopPredicate>,
    state: watch::Sender<PollState>,
}

impl PollSession {
    async fn run(self, cancel: CancellationToken) {
        let started = Instant::now();
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut reads = 0u32;
        let mut last: Option<Arc<Value>> = None;
        debug!(key = %self.key, interval = ?self.config.interval, ceiling = ?self.config.max_duration, "poll started");

        let terminal = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break PollState::Cancelled { reads },
                _ = interval.tick() => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= self.config.max_duration {
                break PollState::TimedOut { reads, elapsed, last };
            }

            reads += 1;
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => break PollState::Cancelled { reads },
                result = self.store.read(&self.key, ReadOptions::polling()) => result,
            };

            match result {
                Ok(value) => match self.predicate.evaluate(&value) {
                    PollVerdict::Continue => {
                        last = Some(value);
                        self.publish(PollState::Polling { reads, last: last.clone() });
                    }
                    PollVerdict::Succeeded => break PollState::Succeeded { reads, value },
                    PollVerdict::Failed(message) => {
                        break PollState::Failed { reads, last: Some(value), message };
                    }
                },
                Err(e) if e.is_unreachable() => {
                    debug!(key = %self.key, reads, "device unreachable, still polling");
                    self.publish(PollState::Polling { reads, last: last.clone() });
                }
                Err(e) => {
                    break PollState::Failed { reads, last, message: e.to_string() };
                }
            }
        };

        match &terminal {
            PollState::Succeeded { reads, .. } => info!(key = %self.key, reads, "poll succeeded"),
            PollState::Failed { reads, message, .. } => {
                warn!(key = %self.key, reads, %message, "poll failed");
            }
            PollState::TimedOut { reads, elapsed, .. } => {
                warn!(key = %self.key, reads, ?elapsed, "poll timed out");
            }
            _ => debug!(key = %self.key, reads = terminal.reads(), "poll cancelled"),
        }
        self.publish(terminal);
    }

    fn publish(&self, state: PollState) {
        self.state.send_replace(state);
    }
}
