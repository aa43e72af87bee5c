//! Partitioned record store and deferred-write queue.
//!
//! Each business partition is its own table keyed by record id. Rows keep a
//! `position` so reads come back in the order the server sent them. The
//! queue lives in `sync_queue` with an AUTOINCREMENT id, so ids are never
//! reused even after synced rows are purged. Views that are not partitions
//! (summaries, metrics, detail pages) are kept whole in `view_cache`, keyed by
//! the exact endpoint they were read from.

use crate::error::{StorageError, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use stockroom_types::{HttpMethod, Partition, QueuedOperation, Record, RecordId};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA_VERSION: u32 = 2;
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// The last known state of a partition.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorSnapshot {
    pub partition: Partition,
    pub records: Vec<Record>,
    /// Epoch ms of the last full mirror, `None` if rows only came from upserts.
    pub mirrored_at: Option<i64>,
}

/// Last good response body of a non-partition view.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedView {
    pub body: Value,
    /// Epoch ms when the body was stored.
    pub cached_at: i64,
}

/// Durable client-side store backed by SQLite.
#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    /// Opens or creates a store at the given path.
    ///
    /// Safe to call repeatedly on the same file: tables are only created
    /// when missing.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = crate::open_sqlite(path, BUSY_TIMEOUT_MS)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    // ── Business partitions ──

    /// Upserts records into a partition in a single transaction.
    pub fn put(&self, partition: Partition, records: &[Record]) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        upsert_records(&tx, partition, records)?;
        tx.commit()?;
        Ok(())
    }

    /// Replaces the whole partition with `records` and stamps the mirror time.
    pub fn replace_partition(
        &self,
        partition: Partition,
        records: &[Record],
    ) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM \"{}\"", partition.as_str()), [])?;
        upsert_records(&tx, partition, records)?;
        let count: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", partition.as_str()),
            [],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO mirror_state (partition, mirrored_at, record_count) \
             VALUES (?1, ?2, ?3)",
            params![partition.as_str(), Utc::now().timestamp_millis(), count],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Returns every record in a partition, in stored order.
    pub fn get_all(&self, partition: Partition) -> StorageResult<Vec<Record>> {
        let conn = self.conn()?;
        read_records(&conn, partition)
    }

    /// Returns the partition contents with its mirror time.
    ///
    /// `None` means nothing is known about the partition: it was never
    /// mirrored and holds no rows.
    pub fn snapshot(&self, partition: Partition) -> StorageResult<Option<MirrorSnapshot>> {
        let conn = self.conn()?;
        let records = read_records(&conn, partition)?;
        let mirrored_at: Option<i64> = conn
            .query_row(
                "SELECT mirrored_at FROM mirror_state WHERE partition = ?1",
                params![partition.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        if records.is_empty() && mirrored_at.is_none() {
            return Ok(None);
        }
        Ok(Some(MirrorSnapshot {
            partition,
            records,
            mirrored_at,
        }))
    }

    // ── View responses ──

    /// Stores the body last returned for `endpoint`, replacing any older one.
    pub fn put_view(&self, endpoint: &str, body: &Value) -> StorageResult<()> {
        let body_json = serde_json::to_string(body)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO view_cache (endpoint, body_json, cached_at) \
             VALUES (?1, ?2, ?3)",
            params![endpoint, body_json, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    pub fn get_view(&self, endpoint: &str) -> StorageResult<Option<CachedView>> {
        let conn = self.conn()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT body_json, cached_at FROM view_cache WHERE endpoint = ?1",
                params![endpoint],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(body_json, cached_at)| {
            let body = serde_json::from_str(&body_json)
                .map_err(|e| StorageError::Corrupt(format!("view_cache {endpoint}: {e}")))?;
            Ok(CachedView { body, cached_at })
        })
        .transpose()
    }

    // ── Sync queue ──

    /// Appends a pending operation and returns it with its assigned id.
    pub fn enqueue(
        &self,
        method: HttpMethod,
        endpoint: &str,
        data: &Value,
    ) -> StorageResult<QueuedOperation> {
        let data_json = serde_json::to_string(data)?;
        let timestamp = Utc::now().timestamp_millis();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sync_queue (method, endpoint, data_json, timestamp, synced) \
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![method.as_str(), endpoint, data_json, timestamp],
        )?;

        Ok(QueuedOperation {
            id: conn.last_insert_rowid(),
            method,
            endpoint: endpoint.to_string(),
            data: data.clone(),
            timestamp,
            synced: false,
        })
    }

    /// Unsynced operations in enqueue order.
    pub fn list_pending(&self) -> StorageResult<Vec<QueuedOperation>> {
        let conn = self.conn()?;
        query_operations(
            &conn,
            "SELECT id, method, endpoint, data_json, timestamp, synced FROM sync_queue \
             WHERE synced = 0 ORDER BY id",
        )
    }

    /// Every operation ever queued and not yet purged, synced or not.
    pub fn list_operations(&self) -> StorageResult<Vec<QueuedOperation>> {
        let conn = self.conn()?;
        query_operations(
            &conn,
            "SELECT id, method, endpoint, data_json, timestamp, synced FROM sync_queue ORDER BY id",
        )
    }

    /// Marks an operation as synced.
    ///
    /// Returns `false` when the id is unknown or was already synced.
    pub fn mark_synced(&self, id: i64) -> StorageResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE sync_queue SET synced = 1 WHERE id = ?1 AND synced = 0",
            params![id],
        )?;
        Ok(changed == 1)
    }

    pub fn pending_count(&self) -> StorageResult<usize> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM sync_queue WHERE synced = 0", [], |row| {
                row.get(0)
            })?;
        Ok(count as usize)
    }

    /// Deletes synced operations created before `cutoff_ms`.
    ///
    /// Pending operations are never touched.
    pub fn purge_synced_before(&self, cutoff_ms: i64) -> StorageResult<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM sync_queue WHERE synced = 1 AND timestamp < ?1",
            params![cutoff_ms],
        )?;
        Ok(removed)
    }
}

fn upsert_records(
    conn: &Connection,
    partition: Partition,
    records: &[Record],
) -> StorageResult<()> {
    let table = partition.as_str();
    let mut next_position: i64 = conn.query_row(
        &format!("SELECT COALESCE(MAX(position) + 1, 0) FROM \"{table}\""),
        [],
        |row| row.get(0),
    )?;

    // Existing rows keep their position; only the payload is replaced.
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO \"{table}\" (id, position, data_json) VALUES (?1, ?2, ?3) \
         ON CONFLICT(id) DO UPDATE SET data_json = excluded.data_json"
    ))?;
    for record in records {
        let data_json = serde_json::to_string(&record.data)?;
        stmt.execute(params![record.id.as_str(), next_position, data_json])?;
        next_position += 1;
    }
    Ok(())
}

fn read_records(conn: &Connection, partition: Partition) -> StorageResult<Vec<Record>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, data_json FROM \"{}\" ORDER BY position",
        partition.as_str()
    ))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, data_json)| -> StorageResult<Record> {
            let data = serde_json::from_str(&data_json).map_err(|e| {
                StorageError::Corrupt(format!("{} row {id}: {e}", partition.as_str()))
            })?;
            Ok(Record {
                id: RecordId::new(id),
                data,
            })
        })
        .collect()
}

fn query_operations(conn: &Connection, sql: &str) -> StorageResult<Vec<QueuedOperation>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, bool>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, method, endpoint, data_json, timestamp, synced)| -> StorageResult<_> {
            let method = method
                .parse::<HttpMethod>()
                .map_err(|e| StorageError::Corrupt(format!("sync_queue row {id}: {e}")))?;
            let data = serde_json::from_str(&data_json)?;
            Ok(QueuedOperation {
                id,
                method,
                endpoint,
                data,
                timestamp,
                synced,
            })
        })
        .collect()
}

fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let mut ddl = String::new();
    for partition in Partition::ALL {
        ddl.push_str(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                data_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS "idx_{table}_position" ON "{table}"(position);
            "#,
            table = partition.as_str()
        ));
    }

    ddl.push_str(
        r#"
        CREATE TABLE IF NOT EXISTS sync_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            method TEXT NOT NULL,
            endpoint TEXT NOT NULL,
            data_json TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_sync_queue_pending ON sync_queue(synced, id);

        CREATE TABLE IF NOT EXISTS mirror_state (
            partition TEXT PRIMARY KEY,
            mirrored_at INTEGER NOT NULL,
            record_count INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS view_cache (
            endpoint TEXT PRIMARY KEY,
            body_json TEXT NOT NULL,
            cached_at INTEGER NOT NULL
        );
        "#,
    );
    ddl.push_str(&format!("PRAGMA user_version = {SCHEMA_VERSION};"));

    conn.execute_batch(&ddl)?;
    Ok(())
}
