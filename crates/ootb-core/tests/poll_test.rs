#![allow(clippy::unwrap_used)]
// Integration tests for poll sessions against a scripted device.

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ootb_api::Method;
use ootb_core::{
    CacheKey, CacheStore, EntrySnapshot, EntryStatus, PollConfig, PollState, Poller, Registry,
    Resource, StatusPredicate,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use support::{MockDevice, Reply, deferred, unreachable};

const TICK: Duration = Duration::from_secs(1);

fn poller(device: &Arc<MockDevice>) -> (Poller, CacheStore) {
    let store = CacheStore::new(
        device.clone(),
        Registry::validated().unwrap(),
        Duration::from_secs(30),
    );
    (Poller::new(store.clone()), store)
}

async fn drain() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn status_log(store: &CacheStore, key: &CacheKey) -> (Arc<Mutex<Vec<EntryStatus>>>, ootb_core::SubscriptionHandle) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handle = store.subscribe(
        key,
        Arc::new(move |snap: &Arc<EntrySnapshot>| sink.lock().unwrap().push(snap.status)),
    );
    (seen, handle)
}

fn completed_or_error() -> StatusPredicate {
    StatusPredicate::new("status")
        .succeeds_on("completed")
        .fails_on("error")
}

fn running() -> Reply {
    Reply::Ok(json!({ "status": "running" }))
}

#[tokio::test(start_paused = true)]
async fn succeeds_after_exactly_four_reads() {
    let device = MockDevice::new();
    device.on_get(
        "firmware/update",
        [running(), running(), running(), Reply::Ok(json!({ "status": "completed" }))],
    );
    let (poller, _store) = poller(&device);

    let handle = poller.start(
        CacheKey::bare(Resource::FirmwareUpdate),
        PollConfig::new(TICK, Duration::from_secs(60)),
        completed_or_error(),
    );
    let state = handle.wait().await;

    assert_eq!(
        state,
        PollState::Succeeded {
            reads: 4,
            value: Arc::new(json!({ "status": "completed" })),
        }
    );
    assert_eq!(device.count(Method::Get, "firmware/update"), 4);
}

#[tokio::test(start_paused = true)]
async fn first_read_is_immediate() {
    let device = MockDevice::new();
    device.on_get("firmware/update", [Reply::Ok(json!({ "status": "completed" }))]);
    let (poller, _store) = poller(&device);
    let started = tokio::time::Instant::now();

    let state = poller
        .start(
            CacheKey::bare(Resource::FirmwareUpdate),
            PollConfig::new(Duration::from_secs(10), Duration::from_secs(60)),
            completed_or_error(),
        )
        .wait()
        .await;

    assert_eq!(state.reads(), 1);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn unreachable_ticks_are_ridden_out_until_device_reports_error() {
    let device = MockDevice::new();
    device.on_get(
        "firmware/update",
        [
            Reply::Fail(unreachable()),
            Reply::Fail(unreachable()),
            Reply::Ok(json!({ "status": "error" })),
        ],
    );
    let (poller, _store) = poller(&device);

    let state = poller
        .start(
            CacheKey::bare(Resource::FirmwareUpdate),
            PollConfig::new(TICK, Duration::from_secs(60)),
            completed_or_error(),
        )
        .wait()
        .await;

    match state {
        PollState::Failed { reads, last, .. } => {
            assert_eq!(reads, 3);
            assert_eq!(last.as_deref(), Some(&json!({ "status": "error" })));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn times_out_at_the_fifth_tick() {
    let device = MockDevice::new();
    device.on_get("firmware/update", [running()]);
    let (poller, _store) = poller(&device);
    let started = tokio::time::Instant::now();

    let state = poller
        .start(
            CacheKey::bare(Resource::FirmwareUpdate),
            PollConfig::new(TICK, TICK * 5),
            completed_or_error(),
        )
        .wait()
        .await;

    match state {
        PollState::TimedOut { reads, elapsed, last } => {
            assert_eq!(reads, 5);
            assert_eq!(elapsed, TICK * 5);
            assert_eq!(last.as_deref(), Some(&json!({ "status": "running" })));
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }
    assert_eq!(started.elapsed(), TICK * 5);
    assert_eq!(device.count(Method::Get, "firmware/update"), 5);
}

#[tokio::test(start_paused = true)]
async fn always_unreachable_device_still_times_out() {
    let device = MockDevice::new();
    device.on_get("firmware/update", [Reply::Fail(unreachable())]);
    let (poller, _store) = poller(&device);

    let result = poller
        .start(
            CacheKey::bare(Resource::FirmwareUpdate),
            PollConfig::new(TICK, TICK * 3),
            completed_or_error(),
        )
        .into_result()
        .await;

    assert!(matches!(result, Err(ootb_core::CoreError::PollTimedOut { .. })));
}

#[tokio::test(start_paused = true)]
async fn http_error_fails_the_session() {
    let device = MockDevice::new();
    device.on_get(
        "firmware/update",
        [Reply::Fail(ootb_api::Error::Http {
            status: 500,
            body: "internal".into(),
        })],
    );
    let (poller, _store) = poller(&device);

    let state = poller
        .start(
            CacheKey::bare(Resource::FirmwareUpdate),
            PollConfig::new(TICK, Duration::from_secs(60)),
            completed_or_error(),
        )
        .wait()
        .await;

    assert!(matches!(state, PollState::Failed { reads: 1, last: None, .. }));
}

#[tokio::test(start_paused = true)]
async fn subscribers_never_see_an_error_while_polling_through_a_reboot() {
    let device = MockDevice::new();
    device.on_get(
        "firmware/update",
        [
            running(),
            Reply::Fail(unreachable()),
            Reply::Fail(unreachable()),
            Reply::Ok(json!({ "status": "completed" })),
        ],
    );
    let (poller, store) = poller(&device);
    let key = CacheKey::bare(Resource::FirmwareUpdate);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = store.subscribe(
        &key,
        Arc::new(move |snap: &Arc<EntrySnapshot>| sink.lock().unwrap().push(snap.status)),
    );

    let state = poller
        .start(key, PollConfig::new(TICK, Duration::from_secs(60)), completed_or_error())
        .wait()
        .await;

    assert!(matches!(state, PollState::Succeeded { reads: 4, .. }));
    let seen = seen.lock().unwrap();
    assert!(!seen.contains(&EntryStatus::Error));
    assert_eq!(seen.last(), Some(&EntryStatus::Success));
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_the_session() {
    let device = MockDevice::new();
    device.on_get("firmware/update", [running()]);
    let (poller, _store) = poller(&device);

    let mut handle = poller.start(
        CacheKey::bare(Resource::FirmwareUpdate),
        PollConfig::new(TICK, Duration::from_secs(60)),
        completed_or_error(),
    );
    let first = handle.changed().await.unwrap();
    assert!(matches!(first, PollState::Polling { reads: 1, .. }));

    handle.cancel();
    let state = handle.wait().await;
    assert!(matches!(state, PollState::Cancelled { .. }));

    tokio::time::sleep(TICK * 10).await;
    assert_eq!(device.count(Method::Get, "firmware/update"), 1);
}

#[tokio::test(start_paused = true)]
async fn active_poll_blocks_eviction() {
    let device = MockDevice::new();
    device.on_get("firmware/update", [running()]);
    let (poller, store) = poller(&device);
    let key = CacheKey::bare(Resource::FirmwareUpdate);

    let handle = poller.start(
        key.clone(),
        PollConfig::new(TICK, Duration::from_secs(600)),
        completed_or_error(),
    );
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(store.evict_idle().is_empty());
    assert!(store.contains(&key));

    drop(handle);
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(store.evict_idle(), vec![key]);
}

#[tokio::test(start_paused = true)]
async fn cancel_all_stops_every_session() {
    let device = MockDevice::new();
    device.on_get("firmware/update", [running()]);
    device.on_get("networks", [Reply::Ok(json!({ "status": "scanning" }))]);
    let (poller, _store) = poller(&device);
    let config = PollConfig::new(TICK, Duration::from_secs(60));

    let firmware = poller.start(CacheKey::bare(Resource::FirmwareUpdate), config, completed_or_error());
    let scan = poller.start(
        CacheKey::bare(Resource::Networks),
        config,
        ootb_core::scan_complete_predicate(),
    );
    poller.cancel_all();

    assert!(matches!(firmware.wait().await, PollState::Cancelled { .. }));
    assert!(matches!(scan.wait().await, PollState::Cancelled { .. }));
}

// ── Ending a poll on an unreachable device ─────────────────────────

#[tokio::test(start_paused = true)]
async fn timed_out_poll_leaves_unreachable_entry_in_error() {
    let device = MockDevice::new();
    device.on_get("firmware/update", [running(), Reply::Fail(unreachable())]);
    let (poller, store) = poller(&device);
    let key = CacheKey::bare(Resource::FirmwareUpdate);
    let (seen, _sub) = status_log(&store, &key);

    let state = poller
        .start(key.clone(), PollConfig::new(TICK, TICK * 5), completed_or_error())
        .wait()
        .await;
    drain().await;

    assert!(matches!(state, PollState::TimedOut { reads: 5, .. }));
    let snap = store.peek(&key).unwrap();
    assert_eq!(snap.status, EntryStatus::Error);
    assert!(snap.error.as_ref().unwrap().is_unreachable());
    assert_eq!(snap.value.as_deref(), Some(&json!({ "status": "running" })));
    assert_eq!(seen.lock().unwrap().last(), Some(&EntryStatus::Error));
}

#[tokio::test(start_paused = true)]
async fn cancelled_poll_leaves_unreachable_entry_in_error() {
    let device = MockDevice::new();
    device.on_get("firmware/update", [Reply::Fail(unreachable())]);
    let (poller, store) = poller(&device);
    let key = CacheKey::bare(Resource::FirmwareUpdate);
    let (seen, _sub) = status_log(&store, &key);

    let mut handle = poller.start(
        key.clone(),
        PollConfig::new(TICK, Duration::from_secs(60)),
        completed_or_error(),
    );
    handle.changed().await.unwrap();
    assert!(store.peek(&key).unwrap().is_loading());

    handle.cancel();
    assert!(matches!(handle.wait().await, PollState::Cancelled { .. }));
    drain().await;

    let snap = store.peek(&key).unwrap();
    assert_eq!(snap.status, EntryStatus::Error);
    assert!(snap.error.as_ref().unwrap().is_unreachable());
    assert_eq!(seen.lock().unwrap().last(), Some(&EntryStatus::Error));
}

#[tokio::test(start_paused = true)]
async fn read_landing_after_cancel_records_unreachable_as_error() {
    let device = MockDevice::new();
    let (tx, reply) = deferred();
    device.on_get("firmware/update", [reply]);
    let (poller, store) = poller(&device);
    let key = CacheKey::bare(Resource::FirmwareUpdate);

    let handle = poller.start(
        key.clone(),
        PollConfig::new(TICK, Duration::from_secs(60)),
        completed_or_error(),
    );
    drain().await;
    handle.cancel();
    assert!(matches!(handle.wait().await, PollState::Cancelled { .. }));
    drain().await;
    assert!(store.peek(&key).unwrap().is_loading());

    tx.send(Err(unreachable())).unwrap();
    drain().await;

    let snap = store.peek(&key).unwrap();
    assert_eq!(snap.status, EntryStatus::Error);
    assert!(snap.error.as_ref().unwrap().is_unreachable());
}
