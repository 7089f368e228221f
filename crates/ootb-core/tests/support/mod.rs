// Scripted in-process device for engine tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use ootb_api::{Error, Method, Request, Transport};
use serde_json::Value;
use tokio::sync::oneshot;

/// One scripted answer.
pub enum Reply {
    Ok(Value),
    Fail(Error),
    /// Answer after a delay on the (usually paused) tokio clock.
    Delayed(Duration, Value),
    /// Answer whenever the test sends on the paired channel.
    Deferred(oneshot::Receiver<Result<Value, Error>>),
}

impl Reply {
    fn try_clone(&self) -> Option<Self> {
        match self {
            Self::Ok(v) => Some(Self::Ok(v.clone())),
            Self::Fail(e) => Some(Self::Fail(e.clone())),
            Self::Delayed(d, v) => Some(Self::Delayed(*d, v.clone())),
            Self::Deferred(_) => None,
        }
    }
}

/// A deferred reply plus the sender that resolves it.
pub fn deferred() -> (oneshot::Sender<Result<Value, Error>>, Reply) {
    let (tx, rx) = oneshot::channel();
    (tx, Reply::Deferred(rx))
}

pub fn unreachable() -> Error {
    Error::Unreachable {
        url: "https://device.test/api/".into(),
        reason: "connection refused".into(),
    }
}

/// Replies are consumed in order per (method, path). The last cloneable
/// reply repeats forever.
#[derive(Default)]
pub struct MockDevice {
    script: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<Request>>,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, method: Method, path: &str, replies: impl IntoIterator<Item = Reply>) {
        self.script
            .lock()
            .unwrap()
            .entry((method, path.to_owned()))
            .or_default()
            .extend(replies);
    }

    pub fn on_get(&self, path: &str, replies: impl IntoIterator<Item = Reply>) {
        self.script(Method::Get, path, replies);
    }

    pub fn on_post(&self, path: &str, replies: impl IntoIterator<Item = Reply>) {
        self.script(Method::Post, path, replies);
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn next_reply(&self, method: Method, path: &str) -> Option<Reply> {
        let mut script = self.script.lock().unwrap();
        let queue = script.get_mut(&(method, path.to_owned()))?;
        if queue.len() == 1 {
            if let Some(repeat) = queue.front().and_then(Reply::try_clone) {
                return Some(repeat);
            }
        }
        queue.pop_front()
    }
}

impl Transport for MockDevice {
    fn request(&self, request: Request) -> BoxFuture<'_, Result<Value, Error>> {
        let reply = self.next_reply(request.method, &request.path);
        let path = request.path.clone();
        self.calls.lock().unwrap().push(request);
        Box::pin(async move {
            match reply {
                Some(Reply::Ok(v)) => Ok(v),
                Some(Reply::Fail(e)) => Err(e),
                Some(Reply::Delayed(d, v)) => {
                    tokio::time::sleep(d).await;
                    Ok(v)
                }
                Some(Reply::Deferred(rx)) => rx.await.unwrap_or_else(|_| Err(unreachable())),
                None => Err(Error::Http {
                    status: 404,
                    body: format!("unscripted request for {path}"),
                }),
            }
        })
    }
}
