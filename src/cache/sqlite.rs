//! SQLite key-value store implementation
//!
//! Backs the result cache when results should survive a restart.

use crate::cache::traits::{KeyValueStore, StorageError, StorageResult};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQL schema for the cache database
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Fixed-width UTC timestamps, so text order is time order
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQLite storage backend
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the cache database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        tracing::debug!("Opened cache database at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cache_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, timestamp(Utc::now())],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    fn clear(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM cache_entries", [])?;
        Ok(())
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE updated_at < ?1",
            params![timestamp(cutoff)],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.set("k", "v1").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v1"));

        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn test_missing_key() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert_eq!(store.get("nope").unwrap(), None);
    }

    #[test]
    fn test_delete_and_clear() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());

        store.clear().unwrap();
        assert_eq!(store.get("b").unwrap(), None);
    }

    #[test]
    fn test_delete_older_than() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.set("old", "1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let cutoff = Utc::now();
        store.set("new", "2").unwrap();

        assert_eq!(store.delete_older_than(cutoff).unwrap(), 1);
        assert_eq!(store.get("old").unwrap(), None);
        assert_eq!(store.get("new").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.set("key", "value").unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.get("key").unwrap().as_deref(), Some("value"));
    }
}
