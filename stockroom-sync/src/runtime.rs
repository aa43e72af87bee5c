//! Wires the offline core together and spawns the sync engine.

use crate::api_client::ApiClient;
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::dispatcher::Dispatcher;
use crate::endpoints;
use crate::engine::{SyncHandle, create_sync_engine};
use crate::error::{SyncError, SyncResult};
use crate::queue::SyncQueueManager;
use crate::status::SyncStatus;
use crate::transport::ApiTransport;
use std::sync::Arc;
use stockroom_storage::OfflineCache;
use stockroom_types::Connectivity;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// The running offline core.
pub struct OfflineRuntime {
    pub dispatcher: Arc<Dispatcher>,
    pub queue: Arc<SyncQueueManager>,
    pub connectivity: ConnectivityMonitor,
    pub handle: SyncHandle,
    engine_task: JoinHandle<()>,
}

impl OfflineRuntime {
    /// Forwards a platform connectivity notification.
    pub fn report_connectivity(&self, state: Connectivity) -> bool {
        self.connectivity.report(state)
    }

    pub fn status(&self) -> SyncStatus {
        self.handle.status()
    }

    /// Stops the engine and waits for its task to finish.
    pub async fn shutdown(self) -> SyncResult<()> {
        if let Err(e) = self.handle.stop().await {
            warn!("sync engine already gone: {e}");
        }
        self.engine_task.await.map_err(|e| {
            SyncError::Config(format!("sync engine task failed: {e}"))
        })?;
        info!("offline runtime shut down");
        Ok(())
    }
}

/// Starts the offline core against the configured backend.
///
/// The cache is opened at `store_path`, or kept in memory when unset. A store
/// that cannot be opened leaves the cache disabled rather than failing.
pub async fn start(config: SyncConfig, initial: Connectivity) -> SyncResult<OfflineRuntime> {
    config.validate()?;

    let cache = match &config.store_path {
        Some(path) => OfflineCache::open(path).await,
        None => OfflineCache::in_memory(),
    };
    let client = Arc::new(ApiClient::new(&config)?);

    start_with_transport(config, client, cache, initial)
}

/// Starts the offline core with an explicit transport and cache.
///
/// Must be called from within a tokio runtime.
pub fn start_with_transport(
    config: SyncConfig,
    transport: Arc<dyn ApiTransport>,
    cache: OfflineCache,
    initial: Connectivity,
) -> SyncResult<OfflineRuntime> {
    config.validate()?;

    if !cache.is_available() {
        warn!("offline cache unavailable, writes made while offline will not be kept");
    }

    let connectivity = ConnectivityMonitor::new(initial, config.event_buffer);
    let dispatcher = Arc::new(
        Dispatcher::new(transport, cache, Arc::new(connectivity.clone()))
            .with_views(endpoints::collection_views()),
    );
    let queue = Arc::new(SyncQueueManager::new(dispatcher.clone()));

    let (handle, engine) = create_sync_engine(queue.clone(), connectivity.clone(), &config);
    let engine_task = tokio::spawn(engine.run());

    info!("offline runtime started ({initial})");

    Ok(OfflineRuntime {
        dispatcher,
        queue,
        connectivity,
        handle,
        engine_task,
    })
}
