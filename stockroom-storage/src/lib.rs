//! SQLite storage layer for Stockroom.
//!
//! Provides the client-side half of the offline core:
//!
//! - One table per business partition holding the last mirrored snapshot
//! - A `sync_queue` table holding writes deferred while offline
//! - A `mirror_state` table recording when each partition was last mirrored
//! - A `view_cache` table holding the last response of each non-partition view
//!
//! [`LocalStore`] is the synchronous, error-returning store. [`OfflineCache`]
//! wraps it for async callers and degrades to no-ops when storage is missing.

mod cache;
mod error;
mod local_store;

pub use cache::OfflineCache;
pub use error::{StorageError, StorageResult};
pub use local_store::{CachedView, LocalStore, MirrorSnapshot};

use rusqlite::Connection;
use std::path::Path;

/// Open a SQLite connection for the offline cache.
///
/// Creates the parent directory when missing and switches the database to
/// WAL mode so readers never block the writer. `busy_timeout_ms` bounds how
/// long a statement waits on a lock held by another connection to the same
/// file.
pub fn open_sqlite(path: &Path, busy_timeout_ms: u32) -> StorageResult<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Unavailable(format!("{}: {e}", parent.display())))?;
        }
    }
    let conn = Connection::open(path)?;
    apply_pragmas(&conn, busy_timeout_ms)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection, busy_timeout_ms: u32) -> StorageResult<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout={};",
        busy_timeout_ms
    ))?;
    Ok(())
}
