//! Durable key-value storage for the gallery's metadata projection.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

use crate::gallery::ClipMetadata;

/// Key holding the JSON array of clip metadata.
pub const GALLERY_KEY: &str = "faceTrackVideos";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed gallery metadata: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

/// String-keyed, string-valued store. Writes overwrite wholesale.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Volatile store, lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// SQLite-backed store with a single `kv` table.
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let connection = Connection::open(db_path)?;
        Self::init(connection)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(connection: Connection) -> Result<Self, StoreError> {
        connection.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.connection.lock().map_err(|_| StoreError::Poisoned)?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.connection.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Read the persisted projection. A missing key is an empty gallery.
pub fn load_projection(store: &dyn KeyValueStore) -> Result<Vec<ClipMetadata>, StoreError> {
    match store.get(GALLERY_KEY)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

/// Overwrite the persisted projection with `entries`.
pub fn save_projection(
    store: &dyn KeyValueStore,
    entries: &[ClipMetadata],
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(entries)?;
    store.set(GALLERY_KEY, &raw)?;
    tracing::debug!(entries = entries.len(), "gallery metadata persisted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::ClipId;
    use chrono::{TimeZone, Utc};

    fn meta(id: u64, name: &str) -> ClipMetadata {
        ClipMetadata {
            id: ClipId(id),
            created_at: Utc.timestamp_millis_opt(id as i64).unwrap(),
            display_name: name.into(),
        }
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "a").unwrap();
        store.set("k", "b").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_sqlite_store_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set(GALLERY_KEY, "[]").unwrap();
        store.set(GALLERY_KEY, "[1]").unwrap();
        assert_eq!(store.get(GALLERY_KEY).unwrap().as_deref(), Some("[1]"));
        assert_eq!(store.get("other").unwrap(), None);
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/gallery.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            save_projection(&store, &[meta(1, "a"), meta(2, "b")]).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let loaded = load_projection(&store).unwrap();
        assert_eq!(loaded, vec![meta(1, "a"), meta(2, "b")]);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let store = MemoryStore::new();
        assert!(load_projection(&store).unwrap().is_empty());
    }

    #[test]
    fn test_load_malformed_errors() {
        let store = MemoryStore::new();
        store.set(GALLERY_KEY, "{oops").unwrap();
        assert!(matches!(
            load_projection(&store),
            Err(StoreError::Malformed(_))
        ));
    }
}
