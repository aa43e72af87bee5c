//! Offline resilience for the Stockroom dashboard.
//!
//! Routes every backend call through a connectivity-aware dispatcher:
//! - Network-first reads mirrored into the offline cache, with cache fallback
//! - Writes queued while offline and replayed in order on reconnect
//! - A reconciliation engine driven by platform connectivity events
//! - A typed catalogue of the backend's endpoints

pub mod api_client;
pub mod config;
pub mod connectivity;
pub mod dispatcher;
pub mod endpoints;
pub mod engine;
pub mod error;
pub mod queue;
pub mod runtime;
pub mod status;
pub mod transport;

pub use api_client::ApiClient;
pub use config::SyncConfig;
pub use connectivity::{ConnectivityMonitor, ConnectivityProbe};
pub use dispatcher::{Dispatcher, MirrorMode, ReadOutcome, ReadRequest, WriteOutcome, WriteRequest};
pub use engine::{SyncCommand, SyncEngine, SyncHandle, create_sync_engine};
pub use error::{SyncError, SyncResult};
pub use queue::{DrainOutcome, DrainReport, SyncQueueManager};
pub use runtime::{OfflineRuntime, start, start_with_transport};
pub use status::SyncStatus;
pub use transport::{ApiRequest, ApiResponse, ApiTransport};
