//! Connectivity-aware dispatcher.
//!
//! Every UI read and write goes through here:
//! - reads go to the network first, are mirrored into the offline cache on
//!   success and fall back to the last mirror on any failure; views that are
//!   not partitions keep their last whole response instead
//! - writes go to the network; an unreachable backend while the platform
//!   reports `Offline` queues the write instead of failing it
//! - responses the backend sends back, including refusals, are never queued

use crate::connectivity::ConnectivityProbe;
use crate::error::{SyncError, SyncResult};
use crate::transport::{ApiRequest, ApiResponse, ApiTransport};
use serde_json::Value;
use std::sync::Arc;
use stockroom_storage::OfflineCache;
use stockroom_types::{Connectivity, HttpMethod, Partition, QueuedOperation, Record};
use tracing::{debug, info, warn};

/// How a successful read is kept for offline use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorMode {
    /// Whole-collection fetch: the partition becomes exactly the response.
    Replace,
    /// Filtered fetch: returned rows are upserted, others are kept.
    Merge,
    /// Not a partition: the whole body is kept, keyed by endpoint.
    Response,
}

/// A GET the UI wants to display.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub endpoint: String,
    pub partition: Option<Partition>,
    pub mirror: MirrorMode,
}

impl ReadRequest {
    pub fn collection(partition: Partition, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            partition: Some(partition),
            mirror: MirrorMode::Replace,
        }
    }

    pub fn filtered(partition: Partition, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            partition: Some(partition),
            mirror: MirrorMode::Merge,
        }
    }

    /// Summary, metrics or detail view cached as an opaque response.
    pub fn response(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            partition: None,
            mirror: MirrorMode::Response,
        }
    }
}

/// Result of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// Live server response, unmodified.
    Fresh(Value),
    /// Network failed; last mirrored records.
    Cached {
        records: Vec<Record>,
        mirrored_at: Option<i64>,
    },
    /// Network failed; the last mirror confirmed the collection was empty.
    CachedEmpty { mirrored_at: Option<i64> },
    /// Network failed; last body stored for this exact endpoint.
    CachedResponse { body: Value, cached_at: i64 },
    /// Network failed and nothing is cached for this view.
    NoCache,
}

impl ReadOutcome {
    /// True when the UI should show a degraded/offline indicator.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Fresh(_))
    }

    /// Rows to display, if any are known.
    pub fn rows(&self) -> Option<Vec<Value>> {
        match self {
            Self::Fresh(Value::Array(items)) => Some(items.clone()),
            Self::Fresh(_) => None,
            Self::CachedResponse {
                body: Value::Array(items),
                ..
            } => Some(items.clone()),
            Self::CachedResponse { .. } => None,
            Self::Cached { records, .. } => {
                Some(records.iter().map(|r| r.data.clone()).collect())
            }
            Self::CachedEmpty { .. } => Some(Vec::new()),
            Self::NoCache => None,
        }
    }
}

/// A state-changing call.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    method: HttpMethod,
    endpoint: String,
    payload: Value,
}

impl WriteRequest {
    pub fn new(
        method: HttpMethod,
        endpoint: impl Into<String>,
        payload: Value,
    ) -> SyncResult<Self> {
        let endpoint = endpoint.into();
        if !method.is_write() {
            return Err(SyncError::InvalidRequest(format!(
                "{method} {endpoint} is not a write"
            )));
        }
        if endpoint.trim().is_empty() {
            return Err(SyncError::InvalidRequest("empty endpoint".to_string()));
        }
        Ok(Self {
            method,
            endpoint,
            payload,
        })
    }

    pub fn post(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            endpoint: endpoint.into(),
            payload,
        }
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            endpoint: endpoint.into(),
            payload: Value::Null,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    fn to_api_request(&self) -> ApiRequest {
        let body = match &self.payload {
            Value::Null => None,
            payload => Some(payload.clone()),
        };
        ApiRequest::new(self.method, self.endpoint.clone(), body)
    }
}

/// Result of a write that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The backend accepted the call; its body, unmodified.
    Completed(Value),
    /// Offline: kept in the sync queue and replayed on reconnect.
    Queued(QueuedOperation),
}

impl WriteOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

/// Single choke point between the UI and the backend.
pub struct Dispatcher {
    transport: Arc<dyn ApiTransport>,
    cache: OfflineCache,
    connectivity: Arc<dyn ConnectivityProbe>,
    views: Vec<ReadRequest>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        cache: OfflineCache,
        connectivity: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        Self {
            transport,
            cache,
            connectivity,
            views: Vec::new(),
        }
    }

    /// Sets the views re-read by [`Dispatcher::refresh_views`].
    pub fn with_views(mut self, views: Vec<ReadRequest>) -> Self {
        self.views = views;
        self
    }

    pub fn cache(&self) -> &OfflineCache {
        &self.cache
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity.current()
    }

    pub fn views(&self) -> &[ReadRequest] {
        &self.views
    }

    // ── Read path ──

    pub async fn read(&self, request: &ReadRequest) -> ReadOutcome {
        match self.transport.execute(&ApiRequest::get(&request.endpoint)).await {
            Ok(resp) if resp.is_ok_status() => {
                self.mirror(request, &resp.body).await;
                ReadOutcome::Fresh(resp.body)
            }
            Ok(resp) => {
                warn!(
                    "GET {} failed with {}, using cache: {}",
                    request.endpoint,
                    resp.status,
                    resp.error_message()
                );
                self.fallback(request).await
            }
            Err(e) => {
                warn!("GET {} failed, using cache: {e}", request.endpoint);
                self.fallback(request).await
            }
        }
    }

    async fn mirror(&self, request: &ReadRequest, body: &Value) {
        let Some(partition) = request.partition else {
            if request.mirror == MirrorMode::Response {
                self.cache.put_view(request.endpoint.clone(), body.clone()).await;
            }
            return;
        };
        if request.mirror == MirrorMode::Response {
            return;
        }
        let Value::Array(items) = body else {
            debug!("GET {} returned a non-array body, not mirrored", request.endpoint);
            return;
        };

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match Record::from_json(item.clone()) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping {partition} row from {}: {e}", request.endpoint),
            }
        }

        match request.mirror {
            MirrorMode::Replace => self.cache.replace_partition(partition, records).await,
            MirrorMode::Merge => self.cache.put(partition, records).await,
            MirrorMode::Response => {}
        }
    }

    async fn fallback(&self, request: &ReadRequest) -> ReadOutcome {
        let Some(partition) = request.partition else {
            return match self.cache.get_view(request.endpoint.clone()).await {
                Some(view) => ReadOutcome::CachedResponse {
                    body: view.body,
                    cached_at: view.cached_at,
                },
                None => ReadOutcome::NoCache,
            };
        };
        match self.cache.snapshot(partition).await {
            None => ReadOutcome::NoCache,
            Some(snapshot) if snapshot.records.is_empty() => ReadOutcome::CachedEmpty {
                mirrored_at: snapshot.mirrored_at,
            },
            Some(snapshot) => ReadOutcome::Cached {
                records: snapshot.records,
                mirrored_at: snapshot.mirrored_at,
            },
        }
    }

    /// Re-reads every registered view. Returns how many came back fresh.
    pub async fn refresh_views(&self) -> usize {
        let mut fresh = 0;
        for view in &self.views {
            if !self.read(view).await.is_degraded() {
                fresh += 1;
            }
        }
        debug!("refreshed {fresh}/{} views", self.views.len());
        fresh
    }

    // ── Write path ──

    pub async fn write(&self, request: WriteRequest) -> SyncResult<WriteOutcome> {
        match self.transport.execute(&request.to_api_request()).await {
            Ok(resp) if resp.is_ok_status() => Ok(WriteOutcome::Completed(resp.body)),
            Ok(resp) => {
                let message = resp.error_message();
                warn!(
                    "{} {} rejected with {}: {message}",
                    request.method, request.endpoint, resp.status
                );
                Err(SyncError::Rejected {
                    status: resp.status,
                    message,
                })
            }
            Err(e) if e.is_unreachable() => self.queue_if_offline(request, e).await,
            Err(e) => Err(e),
        }
    }

    async fn queue_if_offline(
        &self,
        request: WriteRequest,
        cause: SyncError,
    ) -> SyncResult<WriteOutcome> {
        if self.connectivity.current() == Connectivity::Online {
            return Err(cause);
        }

        let WriteRequest {
            method,
            endpoint,
            payload,
        } = request;
        match self.cache.enqueue(method, endpoint.clone(), payload).await {
            Some(op) => {
                info!("queued {method} {endpoint} as operation {} for sync", op.id);
                Ok(WriteOutcome::Queued(op))
            }
            None => {
                warn!("offline and queue unavailable, dropping {method} {endpoint}");
                Err(SyncError::QueueUnavailable(format!("{method} {endpoint}")))
            }
        }
    }

    /// Sends a queued operation straight to the network, with no fallback.
    pub async fn replay(&self, op: &QueuedOperation) -> SyncResult<ApiResponse> {
        self.transport.execute(&ApiRequest::from(op)).await
    }
}
