//! Durable keyed record store backed by SQLite
//!
//! The IndexedDB analog: named collections of JSON records keyed by id,
//! plus the pending-actions table that backs the replay queue. All access
//! serializes on the connection lock, which is the store's transaction
//! boundary. Callers on the request path treat any error here as a cache
//! miss; durability is best-effort for reads and mandatory only for
//! pending actions.

mod records;

pub use records::{
    ConversationRecord, DirectMessageRecord, FollowStatsRecord, PendingAction, Record,
    RoomMessageRecord, RoomRecord, UserRecord,
};

use crate::http::Method;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors from the durable store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("record (de)serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Schema for the record and pending-action tables
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    data BLOB NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, key)
);

CREATE TABLE IF NOT EXISTS pending_actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    method TEXT NOT NULL,
    payload BLOB NOT NULL,
    queued_at INTEGER NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_pending_actions_queued
    ON pending_actions(queued_at);
"#;

/// SQLite-backed durable store
pub struct DurableStore {
    conn: Mutex<Connection>,
}

impl DurableStore {
    /// Open (or create) the store at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                // Creation failure surfaces as an Open error just below
                let _ = std::fs::create_dir_all(parent);
            }
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open an in-memory store (tests, ephemeral sessions)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(STORE_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Upsert a single typed record
    pub fn save<T: Record>(&self, record: &T) -> Result<(), StoreError> {
        let data = serde_json::to_vec(record)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO records (collection, key, data, saved_at)
             VALUES (?, ?, ?, datetime('now'))",
            params![T::collection(), record.key(), data],
        )?;
        Ok(())
    }

    /// Upsert a batch of typed records in one transaction
    pub fn save_many<T: Record>(&self, records: &[T]) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for record in records {
            let data = serde_json::to_vec(record)?;
            tx.execute(
                "INSERT OR REPLACE INTO records (collection, key, data, saved_at)
                 VALUES (?, ?, ?, datetime('now'))",
                params![T::collection(), record.key(), data],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Fetch a typed record by key
    pub fn get<T: Record>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get_raw(T::collection(), key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Fetch every record in a typed collection
    pub fn get_all<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        let values = self.get_all_raw(T::collection())?;
        let mut records = Vec::with_capacity(values.len());
        for value in values {
            records.push(serde_json::from_value(value)?);
        }
        Ok(records)
    }

    /// Upsert a schema-less record into a named collection
    pub fn save_raw(
        &self,
        collection: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let data = serde_json::to_vec(value)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO records (collection, key, data, saved_at)
             VALUES (?, ?, ?, datetime('now'))",
            params![collection, key, data],
        )?;
        Ok(())
    }

    /// Fetch a schema-less record by collection and key
    pub fn get_raw(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT data FROM records WHERE collection = ? AND key = ?")?;
        let data: Option<Vec<u8>> = stmt
            .query_row(params![collection, key], |row| row.get(0))
            .optional()?;
        match data {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch every record in a named collection, ordered by key
    pub fn get_all_raw(&self, collection: &str) -> Result<Vec<serde_json::Value>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT data FROM records WHERE collection = ? ORDER BY key")?;
        let rows = stmt.query_map(params![collection], |row| {
            let data: Vec<u8> = row.get(0)?;
            Ok(data)
        })?;

        let mut values = Vec::new();
        for row in rows {
            values.push(serde_json::from_slice(&row?)?);
        }
        Ok(values)
    }

    /// Drop every record in a collection
    pub fn clear(&self, collection: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM records WHERE collection = ?", params![collection])?;
        Ok(())
    }

    /// Persist a pending action; returns its assigned id.
    ///
    /// The row is committed before this returns, so the caller may safely
    /// acknowledge the action as accepted.
    pub fn insert_pending(
        &self,
        url: &str,
        method: Method,
        payload: &serde_json::Value,
    ) -> Result<i64, StoreError> {
        let data = serde_json::to_vec(payload)?;
        let queued_at = unix_millis();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO pending_actions (url, method, payload, queued_at, synced)
             VALUES (?, ?, ?, ?, 0)",
            params![url, method.as_str(), data, queued_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All pending actions in enqueue order
    pub fn pending_actions(&self) -> Result<Vec<PendingAction>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, url, method, payload, queued_at, synced
             FROM pending_actions ORDER BY queued_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let url: String = row.get(1)?;
            let method: String = row.get(2)?;
            let payload: Vec<u8> = row.get(3)?;
            let queued_at: i64 = row.get(4)?;
            let synced: bool = row.get(5)?;
            Ok((id, url, method, payload, queued_at, synced))
        })?;

        let mut actions = Vec::new();
        for row in rows {
            let (id, url, method, payload, queued_at, synced) = row?;
            let method = Method::parse(&method).unwrap_or(Method::Post);
            actions.push(PendingAction {
                id,
                url,
                method,
                payload: serde_json::from_slice(&payload)?,
                queued_at,
                synced,
            });
        }
        Ok(actions)
    }

    /// Retire a pending action. Deleting an already-retired id is a no-op.
    pub fn delete_pending(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM pending_actions WHERE id = ?", params![id])?;
        Ok(())
    }

    /// Number of actions still queued
    pub fn pending_count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM pending_actions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Current time as unix milliseconds
fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
