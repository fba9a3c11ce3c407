//! Time-expiring key/value cache.
//!
//! The cache is an explicit, injected component: owners hold it by value or
//! `Arc` and read time through a [`Clock`], so there is no process-global state.

use crate::clock::Clock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

struct Entry<V> {
    value: V,
    expires_at: u64,
}

/// A thread-safe cache whose entries expire a fixed TTL after insertion.
pub struct ExpiringCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash + Clone, V: Clone> ExpiringCache<K, V> {
    /// Creates an empty cache.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Returns the live value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Inserts a value, replacing any previous one.
    pub fn insert(&self, key: K, value: V) {
        let expires_at = self
            .clock
            .now_millis()
            .saturating_add(self.ttl.as_millis() as u64);
        self.entries.lock().insert(key, Entry { value, expires_at });
    }

    /// Returns the cached value or computes, stores and returns a new one.
    ///
    /// `load` runs without the cache lock held, so two callers may both
    /// load on a miss; `load` must therefore be idempotent.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &K,
        load: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = load()?;
        self.insert(key.clone(), value.clone());
        Ok(value)
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every expired entry.
    pub fn purge_expired(&self) {
        let now = self.clock.now_millis();
        self.entries.lock().retain(|_, entry| entry.expires_at > now);
    }
}
