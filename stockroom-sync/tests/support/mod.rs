//! Shared helpers for dispatcher, queue and engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use stockroom_sync::{ApiRequest, ApiResponse, ApiTransport, SyncError, SyncResult};

#[derive(Debug, Clone)]
enum Reply {
    Respond(u16, Value),
    Unreachable,
}

/// In-process backend with per-endpoint canned replies.
///
/// Endpoints without a reply are unreachable. Every call is recorded, in
/// order, including the unreachable ones.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<ApiRequest>>,
    down: AtomicBool,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(&self, endpoint: &str, status: u16, body: Value) {
        self.routes
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), Reply::Respond(status, body));
    }

    pub fn unreachable(&self, endpoint: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), Reply::Unreachable);
    }

    /// Makes every endpoint unreachable until switched back.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn endpoints_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.endpoint).collect()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .count()
    }
}

#[async_trait]
impl ApiTransport for ScriptedTransport {
    async fn execute(&self, request: &ApiRequest) -> SyncResult<ApiResponse> {
        self.calls.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.down.load(Ordering::SeqCst) {
            return Err(SyncError::Unreachable("scripted: network down".into()));
        }

        let reply = self
            .routes
            .lock()
            .unwrap()
            .get(&request.endpoint)
            .cloned()
            .unwrap_or(Reply::Unreachable);

        match reply {
            Reply::Respond(status, body) => Ok(ApiResponse::new(status, body)),
            Reply::Unreachable => Err(SyncError::Unreachable(format!(
                "scripted: no route for {}",
                request.endpoint
            ))),
        }
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Routes engine logs to the test output when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
