//! Generic in-memory TTL cache
//!
//! One expiry policy for every cached value type. Expired entries read as
//! absent and are evicted on the next write; there is no background sweep.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A stored value and its lifetime
///
/// Entries are replaced on write, never mutated in place.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub stored_at: DateTime<Utc>,
    pub ttl: Duration,
    inserted: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(key: impl Into<String>, value: V, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value,
            stored_at: Utc::now(),
            ttl,
            inserted: Instant::now(),
        }
    }

    /// Whether the entry has outlived its TTL
    pub fn is_expired(&self) -> bool {
        self.inserted.elapsed() >= self.ttl
    }

    /// Time the entry has been stored
    pub fn age(&self) -> Duration {
        self.inserted.elapsed()
    }
}

/// Lock-protected map of keyed entries with per-entry TTL
///
/// Each `get` or `set` takes the lock once; no operation spans more than
/// one of them.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Creates an empty cache whose `set` uses `default_ttl`
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns a clone of the value if present and not expired
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_entry(key).map(|entry| entry.value)
    }

    /// Returns a clone of the whole entry if present and not expired
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let entries = self.lock();
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .cloned()
    }

    /// Stores a value with the default TTL
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Stores a value with an explicit TTL, evicting expired entries
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut entries = self.lock();
        entries.retain(|_, entry| !entry.is_expired());
        entries.insert(key.clone(), CacheEntry::new(key, value, ttl));
    }

    /// Removes one key; returns whether it was present
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Removes every entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, expired ones included until the next write
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // A panic while holding the lock cannot leave an entry half-written
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
