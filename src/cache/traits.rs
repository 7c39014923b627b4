//! Storage traits and error types
//!
//! This module defines the key-value interface durable cache backends
//! implement, and the errors they report.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Minimal durable key-value store
///
/// Values are opaque strings; callers serialize their own entries.
/// Implementations must be safe to share across tasks.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Inserts or replaces the value stored under `key`
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key`; returns whether it existed
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Removes every key
    fn clear(&self) -> StorageResult<()>;

    /// Removes keys last written before `cutoff`; returns how many went
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<usize>;
}
