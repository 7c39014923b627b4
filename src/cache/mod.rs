//! Result caching
//!
//! This module provides:
//! - `TtlCache`: the one in-memory expiry implementation, generic over the
//!   cached value
//! - `ResultCache`: aggregated price results, optionally written through to
//!   a durable `KeyValueStore`
//! - `SqliteStore`: the SQLite-backed `KeyValueStore`
//! - `cache_key`: deterministic keys from card identity and source set

mod sqlite;
mod traits;
mod ttl;

pub use sqlite::SqliteStore;
pub use traits::{KeyValueStore, StorageError, StorageResult};
pub use ttl::{CacheEntry, TtlCache};

use crate::model::{AggregatedPriceResult, CardQuery};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Derives the cache key for a card and a set of sources
///
/// The key covers the normalized identity fields and the sorted,
/// de-duplicated source names, so request order does not matter.
pub fn cache_key(query: &CardQuery, sources: &[String]) -> String {
    let mut sources: Vec<&str> = sources.iter().map(|s| s.as_str()).collect();
    sources.sort_unstable();
    sources.dedup();

    let mut hasher = Sha256::new();
    for field in query.identity_fields() {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.update(sources.join(",").as_bytes());

    format!("price:{}", hex::encode(hasher.finalize()))
}

/// Serialized form of a result in the durable store
#[derive(Debug, Serialize, Deserialize)]
struct PersistedResult {
    value: AggregatedPriceResult,
    stored_at: DateTime<Utc>,
    ttl_ms: u64,
}

/// Cache of aggregated price results
pub struct ResultCache {
    memory: TtlCache<AggregatedPriceResult>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl ResultCache {
    /// Creates a memory-only cache
    pub fn new(ttl: Duration) -> Self {
        Self {
            memory: TtlCache::new(ttl),
            store: None,
        }
    }

    /// Creates a cache that also persists results to `store`
    pub fn with_store(ttl: Duration, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            memory: TtlCache::new(ttl),
            store: Some(store),
        }
    }

    /// Looks a result up, falling back to the durable store on a memory miss
    ///
    /// Store failures are logged and read as misses.
    pub fn get(&self, key: &str) -> Option<AggregatedPriceResult> {
        if let Some(result) = self.memory.get(key) {
            return Some(result);
        }

        let store = self.store.as_ref()?;
        let raw = match store.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Cache store read failed for {}: {}", key, e);
                return None;
            }
        };

        let persisted: PersistedResult = match serde_json::from_str(&raw) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Discarding unreadable cache entry {}: {}", key, e);
                return None;
            }
        };

        let age = (Utc::now() - persisted.stored_at).to_std().unwrap_or_default();
        let ttl = Duration::from_millis(persisted.ttl_ms);
        if age >= ttl {
            if let Err(e) = store.delete(key) {
                tracing::warn!("Cache store delete failed for {}: {}", key, e);
            }
            return None;
        }

        // Warm the memory tier for the rest of the entry's lifetime
        self.memory
            .set_with_ttl(key, persisted.value.clone(), ttl - age);
        Some(persisted.value)
    }

    /// Stores a result in memory and, when configured, in the durable store
    ///
    /// Writing also drops persisted results older than the cache TTL.
    pub fn set(&self, key: &str, value: AggregatedPriceResult) {
        if let Some(store) = &self.store {
            let now = Utc::now();
            let ttl = self.memory.default_ttl();
            if let Ok(ttl) = chrono::Duration::from_std(ttl) {
                match store.delete_older_than(now - ttl) {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Pruned {} expired cache entries", n),
                    Err(e) => tracing::warn!("Cache store prune failed: {}", e),
                }
            }

            let persisted = PersistedResult {
                value: value.clone(),
                stored_at: now,
                ttl_ms: ttl.as_millis() as u64,
            };

            let written = serde_json::to_string(&persisted)
                .map_err(StorageError::from)
                .and_then(|json| store.set(key, &json));
            if let Err(e) = written {
                tracing::warn!("Cache store write failed for {}: {}", key, e);
            }
        }

        self.memory.set(key, value);
    }

    /// Removes one result from every tier
    pub fn invalidate(&self, key: &str) {
        self.memory.invalidate(key);
        if let Some(store) = &self.store {
            if let Err(e) = store.delete(key) {
                tracing::warn!("Cache store delete failed for {}: {}", key, e);
            }
        }
    }

    /// Removes every result from every tier
    pub fn clear(&self) {
        self.memory.clear();
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                tracing::warn!("Cache store clear failed: {}", e);
            }
        }
    }
}
