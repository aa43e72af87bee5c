//! Connectivity state machine.
//!
//! The platform pushes `Online`/`Offline` notifications into a
//! [`ConnectivityMonitor`]. The dispatcher reads the current state through
//! [`ConnectivityProbe`]; the sync engine subscribes to transitions.

use std::sync::{Arc, Mutex};
use stockroom_types::Connectivity;
use tokio::sync::broadcast;
use tracing::info;

/// Read access to the current link state.
pub trait ConnectivityProbe: Send + Sync {
    fn current(&self) -> Connectivity;
}

struct MonitorInner {
    state: Mutex<Connectivity>,
    transitions: broadcast::Sender<Connectivity>,
}

/// Holds the current link state and broadcasts real transitions.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity, buffer: usize) -> Self {
        let (transitions, _) = broadcast::channel(buffer.max(1));
        Self {
            inner: Arc::new(MonitorInner {
                state: Mutex::new(initial),
                transitions,
            }),
        }
    }

    /// Records a platform notification.
    ///
    /// Returns `true` if the state changed. Repeated reports of the same
    /// state are absorbed and not broadcast.
    pub fn report(&self, state: Connectivity) -> bool {
        let mut current = self
            .inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *current == state {
            return false;
        }
        info!("connectivity changed: {} -> {}", *current, state);
        *current = state;
        // No subscribers is fine: the state itself is still updated.
        let _ = self.inner.transitions.send(state);
        true
    }

    /// Stream of transitions reported after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Connectivity> {
        self.inner.transitions.subscribe()
    }
}

impl ConnectivityProbe for ConnectivityMonitor {
    fn current(&self) -> Connectivity {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(Connectivity::Online, 64)
    }
}
