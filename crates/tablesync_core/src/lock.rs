//! Per-object exclusive and shared locks.
//!
//! A rebuild holds the exclusive lock of its object; readers of the index
//! hold the shared lock. Locking is per object, never global, and every
//! acquisition is bounded by a timeout.

use crate::error::{IndexError, IndexResult};
use crate::types::ObjectId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const TABLE_LOCK_PREFIX: &str = "TABLE-LOCK-";

/// Returns the lock key of an object.
pub fn table_lock_key(object_id: &ObjectId) -> String {
    format!("{TABLE_LOCK_PREFIX}{object_id}")
}

/// Hands out per-object read/write locks.
#[derive(Default)]
pub struct LockCoordinator {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl LockCoordinator {
    /// Creates a coordinator with no locks held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the exclusive lock of `object_id`.
    ///
    /// Waits up to `timeout` for the lock, then fails with
    /// [`IndexError::LockUnavailable`], which is retryable.
    pub fn try_run_with_exclusive_lock<T>(
        &self,
        object_id: &ObjectId,
        timeout: Duration,
        f: impl FnOnce() -> IndexResult<T>,
    ) -> IndexResult<T> {
        let key = table_lock_key(object_id);
        let lock = self.lock_for(&key);
        let result = match lock.try_write_for(timeout) {
            Some(_guard) => {
                debug!(key = %key, "acquired exclusive lock");
                f()
            }
            None => {
                warn!(key = %key, ?timeout, "timed out waiting for exclusive lock");
                Err(IndexError::lock_unavailable(key.clone(), timeout))
            }
        };
        self.release(&key, lock);
        result
    }

    /// Runs `f` while holding the shared lock of `object_id`.
    ///
    /// Shared holders run concurrently with each other but never with an
    /// exclusive holder.
    pub fn try_run_with_shared_lock<T>(
        &self,
        object_id: &ObjectId,
        timeout: Duration,
        f: impl FnOnce() -> IndexResult<T>,
    ) -> IndexResult<T> {
        let key = table_lock_key(object_id);
        let lock = self.lock_for(&key);
        let result = match lock.try_read_for(timeout) {
            Some(_guard) => f(),
            None => {
                warn!(key = %key, ?timeout, "timed out waiting for shared lock");
                Err(IndexError::lock_unavailable(key.clone(), timeout))
            }
        };
        self.release(&key, lock);
        result
    }

    /// Number of keys with a live lock entry.
    pub fn active_keys(&self) -> usize {
        self.locks.lock().len()
    }

    fn lock_for(&self, key: &str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    fn release(&self, key: &str, lock: Arc<RwLock<()>>) {
        let mut locks = self.locks.lock();
        // The map and `lock` are the only holders: nobody else is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }
}
