//! Sync queue manager: replays deferred writes after reconnecting.
//!
//! A drain pass snapshots the pending operations, replays them one at a time
//! in id order, and marks each success as synced. A failed replay stays
//! pending and does not stop the pass. Operations queued while a pass runs
//! are left for the next pass.
//!
//! Only one pass runs at a time. A drain requested while a pass is running
//! is folded into a single follow-up pass run by the current drainer.

use crate::dispatcher::Dispatcher;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// What one or more consecutive passes did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Operation ids in the order they were sent.
    pub attempted: Vec<i64>,
    pub synced: Vec<i64>,
    pub failed: Vec<i64>,
    pub passes: usize,
    pub views_refreshed: bool,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of asking for a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// Another drain was running; it will run one more pass for this request.
    Deferred,
}

#[derive(Default)]
struct GateState {
    running: bool,
    rerun: bool,
}

/// Admits one drainer at a time and records late requests.
#[derive(Default)]
struct DrainGate {
    state: Mutex<GateState>,
}

impl DrainGate {
    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_enter(&self) -> Option<DrainPermit<'_>> {
        let mut state = self.lock();
        if state.running {
            state.rerun = true;
            return None;
        }
        state.running = true;
        state.rerun = false;
        Some(DrainPermit { gate: self })
    }

    fn is_running(&self) -> bool {
        self.lock().running
    }
}

/// Held by the active drainer; releases the gate when dropped.
struct DrainPermit<'a> {
    gate: &'a DrainGate,
}

impl DrainPermit<'_> {
    /// Releases the gate, or hands the permit back if a rerun was requested.
    ///
    /// Checking for a rerun and releasing happen under one lock, so a
    /// request can never slip in between and be lost.
    fn finish(self) -> Result<(), Self> {
        {
            let mut state = self.gate.lock();
            if state.rerun {
                state.rerun = false;
                drop(state);
                return Err(self);
            }
            state.running = false;
        }
        std::mem::forget(self);
        Ok(())
    }
}

impl Drop for DrainPermit<'_> {
    fn drop(&mut self) {
        self.gate.lock().running = false;
    }
}

/// Orchestrates replay of the sync queue.
pub struct SyncQueueManager {
    dispatcher: Arc<Dispatcher>,
    gate: DrainGate,
}

impl SyncQueueManager {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            gate: DrainGate::default(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn is_draining(&self) -> bool {
        self.gate.is_running()
    }

    pub async fn pending_count(&self) -> usize {
        self.dispatcher.cache().pending_count().await
    }

    /// Runs drain passes until no further drain was requested.
    pub async fn drain(&self) -> DrainOutcome {
        let Some(mut permit) = self.gate.try_enter() else {
            debug!("drain already running, folding request into a follow-up pass");
            return DrainOutcome::Deferred;
        };

        let mut report = DrainReport::default();
        loop {
            self.run_pass(&mut report).await;
            match permit.finish() {
                Ok(()) => break,
                Err(again) => {
                    debug!("drain requested during pass {}, running again", report.passes);
                    permit = again;
                }
            }
        }

        DrainOutcome::Completed(report)
    }

    async fn run_pass(&self, report: &mut DrainReport) {
        report.passes += 1;
        let pending = self.dispatcher.cache().list_pending().await;
        if pending.is_empty() {
            debug!("drain pass {}: nothing pending", report.passes);
            return;
        }

        info!("drain pass {}: replaying {} operations", report.passes, pending.len());

        for op in &pending {
            report.attempted.push(op.id);
            match self.dispatcher.replay(op).await {
                Ok(resp) if resp.indicates_success() => {
                    // A concurrent drainer in another process may have won the race.
                    if !self.dispatcher.cache().mark_synced(op.id).await {
                        debug!("operation {} was already marked synced", op.id);
                    }
                    report.synced.push(op.id);
                    info!("synced {} {} (operation {})", op.method, op.endpoint, op.id);
                }
                Ok(resp) => {
                    warn!(
                        "replay of {} {} (operation {}) refused with {}: {}",
                        op.method,
                        op.endpoint,
                        op.id,
                        resp.status,
                        resp.error_message()
                    );
                    report.failed.push(op.id);
                }
                Err(e) => {
                    warn!(
                        "replay of {} {} (operation {}) failed: {e}",
                        op.method, op.endpoint, op.id
                    );
                    report.failed.push(op.id);
                }
            }
        }

        self.dispatcher.refresh_views().await;
        report.views_refreshed = true;
    }
}
