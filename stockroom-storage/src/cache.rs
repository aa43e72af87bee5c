//! Async, never-failing facade over [`LocalStore`].
//!
//! The UI must keep working when local persistence is missing or broken, so
//! every call here resolves to a benign default (empty list, `None`,
//! `false`) instead of an error. Failures are logged and swallowed.

use crate::error::StorageResult;
use crate::local_store::{CachedView, LocalStore, MirrorSnapshot};
use serde_json::Value;
use std::path::Path;
use stockroom_types::{HttpMethod, Partition, QueuedOperation, Record};
use tracing::{debug, info, warn};

/// Offline cache handle. Cheap to clone.
#[derive(Clone, Default)]
pub struct OfflineCache {
    store: Option<LocalStore>,
}

impl OfflineCache {
    pub fn new(store: LocalStore) -> Self {
        Self { store: Some(store) }
    }

    /// A cache with no backing store: reads are empty, writes are dropped.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// Opens the store at `path`, falling back to a disabled cache on error.
    pub async fn open(path: &Path) -> Self {
        let owned = path.to_path_buf();
        match tokio::task::spawn_blocking(move || LocalStore::open(&owned)).await {
            Ok(Ok(store)) => {
                info!("offline cache opened at {}", path.display());
                Self::new(store)
            }
            Ok(Err(e)) => {
                warn!("offline cache disabled, could not open {}: {e}", path.display());
                Self::disabled()
            }
            Err(e) => {
                warn!("offline cache disabled, open task failed: {e}");
                Self::disabled()
            }
        }
    }

    /// Opens an in-memory store, falling back to a disabled cache on error.
    pub fn in_memory() -> Self {
        match LocalStore::open_in_memory() {
            Ok(store) => Self::new(store),
            Err(e) => {
                warn!("offline cache disabled, in-memory store failed: {e}");
                Self::disabled()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    /// Direct access to the underlying store, if any.
    pub fn store(&self) -> Option<&LocalStore> {
        self.store.as_ref()
    }

    pub async fn put(&self, partition: Partition, records: Vec<Record>) {
        self.run("put", move |store| store.put(partition, &records)).await
    }

    pub async fn replace_partition(&self, partition: Partition, records: Vec<Record>) {
        let count = records.len();
        self.run("replace_partition", move |store| {
            store.replace_partition(partition, &records)
        })
        .await;
        debug!("mirrored {count} records into {partition}");
    }

    pub async fn get_all(&self, partition: Partition) -> Vec<Record> {
        self.run("get_all", move |store| store.get_all(partition)).await
    }

    pub async fn snapshot(&self, partition: Partition) -> Option<MirrorSnapshot> {
        self.run("snapshot", move |store| store.snapshot(partition)).await
    }

    pub async fn put_view(&self, endpoint: String, body: Value) {
        self.run("put_view", move |store| store.put_view(&endpoint, &body)).await
    }

    /// Last stored body for `endpoint`; `None` when never stored or unreadable.
    pub async fn get_view(&self, endpoint: String) -> Option<CachedView> {
        self.run("get_view", move |store| store.get_view(&endpoint)).await
    }

    /// Queues a write. `None` when the cache is disabled or the insert failed.
    pub async fn enqueue(
        &self,
        method: HttpMethod,
        endpoint: String,
        data: Value,
    ) -> Option<QueuedOperation> {
        self.run("enqueue", move |store| {
            store.enqueue(method, &endpoint, &data).map(Some)
        })
        .await
    }

    pub async fn list_pending(&self) -> Vec<QueuedOperation> {
        self.run("list_pending", |store| store.list_pending()).await
    }

    pub async fn list_operations(&self) -> Vec<QueuedOperation> {
        self.run("list_operations", |store| store.list_operations()).await
    }

    pub async fn mark_synced(&self, id: i64) -> bool {
        self.run("mark_synced", move |store| store.mark_synced(id)).await
    }

    pub async fn pending_count(&self) -> usize {
        self.run("pending_count", |store| store.pending_count()).await
    }

    pub async fn purge_synced_before(&self, cutoff_ms: i64) -> usize {
        self.run("purge_synced_before", move |store| {
            store.purge_synced_before(cutoff_ms)
        })
        .await
    }

    /// Runs a blocking store call off the async threads.
    async fn run<T, F>(&self, op: &'static str, f: F) -> T
    where
        T: Default + Send + 'static,
        F: FnOnce(&LocalStore) -> StorageResult<T> + Send + 'static,
    {
        let Some(store) = self.store.clone() else {
            debug!("offline cache disabled, {op} skipped");
            return T::default();
        };

        match tokio::task::spawn_blocking(move || f(&store)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!("offline cache {op} failed: {e}");
                T::default()
            }
            Err(e) => {
                warn!("offline cache {op} task panicked: {e}");
                T::default()
            }
        }
    }
}
