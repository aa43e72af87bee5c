//! Reconciliation loop.
//!
//! Coordinates:
//! - Draining the sync queue on every `Offline -> Online` transition, on a
//!   separate task so the loop stays responsive during a pass
//! - An optional drain at startup when online with pending writes
//! - Status badge updates on every transition and drain
//! - Command processing (drain now, stop)
//!
//! Connectivity arrives as an injected event stream, so the loop runs the
//! same against a real platform hook or a test driver.

use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivityProbe};
use crate::error::{SyncError, SyncResult};
use crate::queue::{DrainOutcome, DrainReport, SyncQueueManager};
use crate::status::SyncStatus;
use chrono::Utc;
use std::sync::Arc;
use stockroom_types::Connectivity;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Commands accepted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
    /// Drain now if online.
    DrainNow,
    /// Leave the loop.
    Stop,
}

/// Handle for sending commands to the engine and watching its status.
#[derive(Clone)]
pub struct SyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
    status_rx: watch::Receiver<SyncStatus>,
}

impl SyncHandle {
    pub async fn drain_now(&self) -> SyncResult<()> {
        self.command_tx
            .send(SyncCommand::DrainNow)
            .await
            .map_err(|_| SyncError::NotRunning)
    }

    pub async fn stop(&self) -> SyncResult<()> {
        self.command_tx
            .send(SyncCommand::Stop)
            .await
            .map_err(|_| SyncError::NotRunning)
    }

    /// Current badge state.
    pub fn status(&self) -> SyncStatus {
        *self.status_rx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }
}

/// The reconciliation loop.
pub struct SyncEngine {
    drainer: Drainer,
    connectivity: ConnectivityMonitor,
    transitions: broadcast::Receiver<Connectivity>,
    command_rx: mpsc::Receiver<SyncCommand>,
    drains: JoinSet<()>,
    drain_on_startup: bool,
}

/// Creates the engine and its handle.
///
/// The engine subscribes to `connectivity` here, so transitions reported
/// between creation and `run` are not lost.
pub fn create_sync_engine(
    queue: Arc<SyncQueueManager>,
    connectivity: ConnectivityMonitor,
    config: &SyncConfig,
) -> (SyncHandle, SyncEngine) {
    let (command_tx, command_rx) = mpsc::channel(config.event_buffer.max(1));
    let (status_tx, status_rx) =
        watch::channel(SyncStatus::for_connectivity(connectivity.current()));
    let transitions = connectivity.subscribe();

    let handle = SyncHandle {
        command_tx,
        status_rx,
    };

    let engine = SyncEngine {
        drainer: Drainer {
            queue,
            connectivity: connectivity.clone(),
            status_tx: Arc::new(status_tx),
            synced_retention_secs: config.synced_retention_secs,
        },
        connectivity,
        transitions,
        command_rx,
        drains: JoinSet::new(),
        drain_on_startup: config.drain_on_startup,
    };

    (handle, engine)
}

impl SyncEngine {
    /// Runs the engine event loop until stopped.
    ///
    /// Drains run on their own tasks so transitions and commands are handled
    /// while a pass is in flight. Stopping aborts any pass still running;
    /// its unfinished operations stay pending.
    pub async fn run(mut self) {
        info!("sync engine started ({})", self.connectivity.current());
        self.drainer
            .publish(SyncStatus::for_connectivity(self.connectivity.current()));

        if self.drain_on_startup
            && self.connectivity.current().is_online()
            && self.drainer.queue.pending_count().await > 0
        {
            info!("pending writes found at startup, draining");
            self.spawn_drain();
        }

        loop {
            tokio::select! {
                transition = self.transitions.recv() => {
                    match transition {
                        Ok(Connectivity::Online) => {
                            info!("connection restored");
                            self.spawn_drain();
                        }
                        Ok(Connectivity::Offline) => {
                            info!("connection lost");
                            self.drainer.publish(SyncStatus::Offline);
                        }
                        Err(RecvError::Lagged(missed)) => {
                            warn!(
                                "missed {missed} connectivity events, resyncing from current state"
                            );
                            if self.connectivity.current().is_online() {
                                self.spawn_drain();
                            } else {
                                self.drainer.publish(SyncStatus::Offline);
                            }
                        }
                        Err(RecvError::Closed) => {
                            info!("connectivity stream closed, stopping sync engine");
                            break;
                        }
                    }
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SyncCommand::DrainNow) => {
                            if self.connectivity.current().is_online() {
                                self.spawn_drain();
                            } else {
                                debug!("drain requested while offline, skipped");
                            }
                        }
                        Some(SyncCommand::Stop) => {
                            info!("sync engine stopping");
                            break;
                        }
                        None => {
                            info!("command channel closed, stopping sync engine");
                            break;
                        }
                    }
                }
                Some(joined) = self.drains.join_next(), if !self.drains.is_empty() => {
                    if let Err(e) = joined
                        && e.is_panic()
                    {
                        warn!("drain task panicked: {e}");
                    }
                }
            }
        }

        if !self.drains.is_empty() {
            debug!("aborting {} in-flight drain task(s)", self.drains.len());
            self.drains.abort_all();
        }
        info!("sync engine stopped");
    }

    fn spawn_drain(&mut self) {
        let drainer = self.drainer.clone();
        self.drains.spawn(async move {
            drainer.drain().await;
        });
    }
}

/// Everything a drain task needs, detached from the event loop.
#[derive(Clone)]
struct Drainer {
    queue: Arc<SyncQueueManager>,
    connectivity: ConnectivityMonitor,
    status_tx: Arc<watch::Sender<SyncStatus>>,
    synced_retention_secs: Option<u64>,
}

impl Drainer {
    async fn drain(&self) -> Option<DrainReport> {
        let pending = self.queue.pending_count().await;
        if pending > 0 && self.connectivity.current().is_online() {
            self.publish(SyncStatus::Syncing { pending });
        }

        // A deferred request is served by the running pass, which publishes
        // the final status itself.
        let report = match self.queue.drain().await {
            DrainOutcome::Completed(report) => report,
            DrainOutcome::Deferred => return None,
        };
        if !report.attempted.is_empty() {
            info!(
                "drain finished: {} synced, {} still pending",
                report.synced.len(),
                report.failed.len()
            );
        }

        self.compact().await;
        self.publish(SyncStatus::for_connectivity(self.connectivity.current()));
        Some(report)
    }

    async fn compact(&self) {
        let Some(retention) = self.synced_retention_secs else {
            return;
        };
        let retention_ms = i64::try_from(retention.saturating_mul(1000)).unwrap_or(i64::MAX);
        let cutoff = Utc::now().timestamp_millis().saturating_sub(retention_ms);
        let removed = self
            .queue
            .dispatcher()
            .cache()
            .purge_synced_before(cutoff)
            .await;
        if removed > 0 {
            debug!("purged {removed} synced queue entries");
        }
    }

    fn publish(&self, status: SyncStatus) {
        self.status_tx.send_replace(status);
    }
}
