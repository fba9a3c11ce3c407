//! Persistent status rows.

use crate::error::{IndexError, IndexResult};
use crate::fingerprint::{SchemaFingerprint, VersionFingerprint};
use crate::status::model::{Progress, StatusError, TableState, TableStatus};
use crate::types::ObjectId;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Storage of status rows.
///
/// Every `attempt_*` write is fenced: it applies only if the presented token
/// equals the row's current token and the row is PROCESSING. Otherwise it
/// fails with [`IndexError::ConflictingUpdate`] and leaves the row untouched.
/// A missing row fails with [`IndexError::NotFound`].
pub trait StatusStore: Send + Sync {
    /// Returns the row, if any.
    fn get(&self, object_id: &ObjectId) -> IndexResult<Option<TableStatus>>;

    /// Moves the row to PROCESSING with a new token, creating it if needed.
    ///
    /// Clears progress, error and the stamped fingerprints: the index is
    /// about to be dropped, so nothing it was built from still holds.
    fn reset_to_processing(&self, object_id: &ObjectId, now: u64) -> IndexResult<String>;

    /// Moves the row to AVAILABLE and stamps both fingerprints.
    fn attempt_set_available(
        &self,
        object_id: &ObjectId,
        token: &str,
        version: VersionFingerprint,
        schema: SchemaFingerprint,
        now: u64,
    ) -> IndexResult<()>;

    /// Moves the row to FAILED with the given error.
    fn attempt_set_failed(
        &self,
        object_id: &ObjectId,
        token: &str,
        error: StatusError,
        now: u64,
    ) -> IndexResult<()>;

    /// Records build progress.
    fn attempt_update_progress(
        &self,
        object_id: &ObjectId,
        token: &str,
        progress: Progress,
        now: u64,
    ) -> IndexResult<()>;

    /// Removes the row; returns true if it existed.
    fn delete(&self, object_id: &ObjectId) -> IndexResult<bool>;

    /// Removes the rows of every version of an entity; returns how many were removed.
    fn delete_all_versions(&self, id: u64) -> IndexResult<usize>;

    /// Removes every row.
    fn clear_all(&self) -> IndexResult<()>;
}

/// Generates a new fencing token.
pub fn new_reset_token() -> String {
    Uuid::new_v4().to_string()
}

/// An in-memory status store.
#[derive(Default)]
pub struct MemoryStatusStore {
    rows: RwLock<HashMap<ObjectId, TableStatus>>,
}

impl MemoryStatusStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Overwrites a row. Intended for tests that need an exact prior state.
    pub fn put(&self, status: TableStatus) {
        self.rows.write().insert(status.object_id, status);
    }

    fn fenced_update(
        &self,
        object_id: &ObjectId,
        token: &str,
        next: Option<TableState>,
        apply: impl FnOnce(&mut TableStatus),
    ) -> IndexResult<()> {
        let mut rows = self.rows.write();
        let row = rows
            .get_mut(object_id)
            .ok_or_else(|| IndexError::not_found(format!("status for {object_id}")))?;
        if row.reset_token != token || row.state != TableState::Processing {
            return Err(IndexError::conflicting_update(object_id.to_string(), token));
        }
        if let Some(next) = next {
            debug_assert!(row.state.can_transition_to(next));
            row.state = next;
        }
        apply(row);
        Ok(())
    }
}

impl StatusStore for MemoryStatusStore {
    fn get(&self, object_id: &ObjectId) -> IndexResult<Option<TableStatus>> {
        Ok(self.rows.read().get(object_id).cloned())
    }

    fn reset_to_processing(&self, object_id: &ObjectId, now: u64) -> IndexResult<String> {
        let token = new_reset_token();
        let mut rows = self.rows.write();
        match rows.get_mut(object_id) {
            Some(row) => {
                row.state = TableState::Processing;
                row.reset_token = token.clone();
                row.changed_on = now;
                row.started_on = now;
                row.progress = None;
                row.error = None;
                row.version_fingerprint = None;
                row.schema_fingerprint = None;
            }
            None => {
                rows.insert(
                    *object_id,
                    TableStatus::processing(*object_id, token.clone(), now),
                );
            }
        }
        Ok(token)
    }

    fn attempt_set_available(
        &self,
        object_id: &ObjectId,
        token: &str,
        version: VersionFingerprint,
        schema: SchemaFingerprint,
        now: u64,
    ) -> IndexResult<()> {
        self.fenced_update(object_id, token, Some(TableState::Available), |row| {
            row.changed_on = now;
            row.progress = None;
            row.error = None;
            row.version_fingerprint = Some(version);
            row.schema_fingerprint = Some(schema);
        })
    }

    fn attempt_set_failed(
        &self,
        object_id: &ObjectId,
        token: &str,
        error: StatusError,
        now: u64,
    ) -> IndexResult<()> {
        self.fenced_update(object_id, token, Some(TableState::Failed), |row| {
            row.changed_on = now;
            row.progress = None;
            row.error = Some(error);
        })
    }

    fn attempt_update_progress(
        &self,
        object_id: &ObjectId,
        token: &str,
        progress: Progress,
        now: u64,
    ) -> IndexResult<()> {
        self.fenced_update(object_id, token, None, |row| {
            row.changed_on = now;
            row.progress = Some(progress);
        })
    }

    fn delete(&self, object_id: &ObjectId) -> IndexResult<bool> {
        Ok(self.rows.write().remove(object_id).is_some())
    }

    fn delete_all_versions(&self, id: u64) -> IndexResult<usize> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|key, _| key.id != id);
        Ok(before - rows.len())
    }

    fn clear_all(&self) -> IndexResult<()> {
        self.rows.write().clear();
        Ok(())
    }
}
