//! The exposed index API.

use crate::builder::{BuildOutcome, IndexBuilder};
use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::index_store::{IndexRow, IndexStore};
use crate::lock::LockCoordinator;
use crate::status::{StatusTracker, TableStatus};
use crate::support::{Collaborators, TableSupport};
use crate::types::{ObjectId, TableKind};
use crate::view::ViewManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The user a privileged call is made on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// User id.
    pub user_id: u64,
    /// Whether the user is an administrator.
    pub is_admin: bool,
}

impl Caller {
    /// An administrator.
    pub fn admin(user_id: u64) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    /// A regular user.
    pub fn user(user_id: u64) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }
}

/// Result of [`TableIndexService::read_index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexRead<T> {
    /// The index was AVAILABLE and the reader ran.
    Ready(T),
    /// The index is not queryable yet; its status is returned instead.
    NotReady(TableStatus),
}

/// Entry point for callers and workers.
pub struct TableIndexService {
    config: IndexConfig,
    support: Arc<TableSupport>,
    tracker: Arc<StatusTracker>,
    builder: IndexBuilder,
    views: ViewManager,
    locks: Arc<LockCoordinator>,
    index: Arc<dyn IndexStore>,
}

impl TableIndexService {
    /// Wires the service over its collaborators.
    pub fn new(collaborators: Collaborators, config: IndexConfig) -> Self {
        let support = Arc::new(TableSupport::new(&collaborators, &config));
        let tracker = Arc::new(StatusTracker::new(
            Arc::clone(&collaborators.status),
            Arc::clone(&support),
            Arc::clone(&collaborators.notifier),
            Arc::clone(&collaborators.clock),
            config.clone(),
        ));
        let locks = Arc::new(LockCoordinator::new());
        let builder = IndexBuilder::new(
            Arc::clone(&tracker),
            Arc::clone(&support),
            Arc::clone(&collaborators.index),
            Arc::clone(&locks),
        );
        let views = ViewManager::new(Arc::clone(&support), Arc::clone(&tracker), &config);
        Self {
            config,
            support,
            tracker,
            builder,
            views,
            locks,
            index: collaborators.index,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// The status tracker.
    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    /// The view manager.
    pub fn views(&self) -> &ViewManager {
        &self.views
    }

    /// The truth lookups.
    pub fn support(&self) -> &TableSupport {
        &self.support
    }

    /// See [`StatusTracker::get_or_create_status`].
    pub fn get_or_create_status(&self, object_id: &ObjectId) -> IndexResult<TableStatus> {
        self.tracker.get_or_create_status(object_id)
    }

    /// See [`IndexBuilder::is_index_work_required`].
    pub fn is_index_work_required(&self, object_id: &ObjectId) -> IndexResult<bool> {
        self.builder.is_index_work_required(object_id)
    }

    /// See [`IndexBuilder::create_or_update_index`].
    pub fn create_or_update_index(
        &self,
        object_id: &ObjectId,
        timeout: Duration,
    ) -> IndexResult<BuildOutcome> {
        self.builder.create_or_update_index(object_id, timeout)
    }

    /// Drops the index and forces a full rebuild. Administrators only.
    pub fn rebuild_table(&self, caller: &Caller, object_id: &ObjectId) -> IndexResult<TableStatus> {
        if !caller.is_admin {
            return Err(IndexError::Unauthorized(
                "Only an administrator may perform this operation.".into(),
            ));
        }
        info!(%object_id, user_id = caller.user_id, "rebuilding table");
        self.locks
            .try_run_with_exclusive_lock(object_id, self.config.lock_timeout, || {
                self.index.delete_index(object_id)?;
                self.tracker.set_to_processing_and_trigger_update(object_id)
            })
    }

    /// Runs `reader` over the index rows while holding the shared lock.
    ///
    /// The reader only runs when the status is AVAILABLE, so it never sees a
    /// partially built index.
    pub fn read_index<T>(
        &self,
        object_id: &ObjectId,
        timeout: Duration,
        reader: impl FnOnce(&[IndexRow]) -> T,
    ) -> IndexResult<IndexRead<T>> {
        self.locks
            .try_run_with_shared_lock(object_id, timeout, || {
                let status = self.tracker.get_or_create_status(object_id)?;
                if !status.is_available() {
                    return Ok(IndexRead::NotReady(status));
                }
                let rows = self.index.rows(object_id)?.ok_or_else(|| {
                    IndexError::Index(format!("{object_id} is available but has no index"))
                })?;
                Ok(IndexRead::Ready(reader(&rows)))
            })
    }

    /// Drops the index under the exclusive lock.
    pub fn delete_index(&self, object_id: &ObjectId) -> IndexResult<()> {
        self.builder.delete_index(object_id, self.config.lock_timeout)
    }

    /// Announces the deletion of a table or view.
    pub fn set_deleted(&self, object_id: &ObjectId, kind: TableKind) {
        self.tracker.set_deleted(object_id, kind);
    }

    /// Drops the index and the status row of a deleted object.
    pub fn purge_deleted(&self, object_id: &ObjectId) -> IndexResult<()> {
        self.delete_index(object_id)?;
        self.tracker.remove_status(object_id)?;
        Ok(())
    }
}
