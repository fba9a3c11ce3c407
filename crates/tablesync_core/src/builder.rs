//! The index rebuild pipeline.
//!
//! A rebuild runs while holding the object's exclusive lock:
//!
//! 1. Skip if no work is required.
//! 2. Reset the status to PROCESSING, taking the new token.
//! 3. Drop the old index.
//! 4. Fingerprint the requested columns.
//! 5. For views, add the implicit columns, resolve the scope and queue it
//!    for reconciliation before copying rows from the replication store.
//! 6. Build secondary indices.
//! 7. Stamp the fingerprints and mark AVAILABLE, fenced by the token.
//!
//! A failure in steps 3 to 7 is recorded as FAILED under the same token and
//! returned to the caller.

use crate::column::ColumnModel;
use crate::error::{error_detail, IndexError, IndexResult};
use crate::fingerprint::{SchemaFingerprint, VersionFingerprint};
use crate::index_store::IndexStore;
use crate::lock::LockCoordinator;
use crate::status::{Completion, StatusTracker, TableState};
use crate::support::TableSupport;
use crate::types::{ObjectId, TableKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// What a call to [`IndexBuilder::create_or_update_index`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BuildOutcome {
    /// The index already matched the truth; nothing was done.
    UpToDate,
    /// The index was rebuilt and marked AVAILABLE.
    Built {
        /// Rows copied into the index.
        rows: u64,
        /// The stamped version fingerprint.
        version: VersionFingerprint,
    },
    /// The index was rebuilt but another writer reset the status meanwhile,
    /// so the completion was discarded.
    Superseded,
}

/// Rebuilds table and view indices.
pub struct IndexBuilder {
    tracker: Arc<StatusTracker>,
    support: Arc<TableSupport>,
    index: Arc<dyn IndexStore>,
    locks: Arc<LockCoordinator>,
}

impl IndexBuilder {
    /// Creates a builder.
    pub fn new(
        tracker: Arc<StatusTracker>,
        support: Arc<TableSupport>,
        index: Arc<dyn IndexStore>,
        locks: Arc<LockCoordinator>,
    ) -> Self {
        Self {
            tracker,
            support,
            index,
            locks,
        }
    }

    /// Returns true if the index of `object_id` must be (re)built.
    ///
    /// False for missing or trashed objects. True when the stamped
    /// fingerprints differ from the truth or the status is PROCESSING.
    pub fn is_index_work_required(&self, object_id: &ObjectId) -> IndexResult<bool> {
        if !self.support.is_available(object_id)? {
            return Ok(false);
        }
        if !self.tracker.is_index_synchronized(object_id)? {
            return Ok(true);
        }
        let processing = self
            .tracker
            .status(object_id)?
            .is_some_and(|status| status.state == TableState::Processing);
        Ok(processing)
    }

    /// Rebuilds the index if it is out of date.
    ///
    /// Waits up to `timeout` for the exclusive lock; a timeout is reported as
    /// the retryable [`IndexError::LockUnavailable`](crate::IndexError::LockUnavailable).
    pub fn create_or_update_index(
        &self,
        object_id: &ObjectId,
        timeout: Duration,
    ) -> IndexResult<BuildOutcome> {
        self.locks
            .try_run_with_exclusive_lock(object_id, timeout, || self.build_locked(object_id))
    }

    /// Drops the index of `object_id` under the exclusive lock.
    pub fn delete_index(&self, object_id: &ObjectId, timeout: Duration) -> IndexResult<()> {
        self.locks.try_run_with_exclusive_lock(object_id, timeout, || {
            self.index.delete_index(object_id)
        })
    }

    fn build_locked(&self, object_id: &ObjectId) -> IndexResult<BuildOutcome> {
        let required = match self.is_index_work_required(object_id) {
            Ok(required) => required,
            // A retry will not fix this (e.g. the scope outgrew the limit),
            // so it is recorded like a failed build.
            Err(err) if !err.is_retryable() && !err.is_not_found() => {
                let token = self.tracker.reset_to_processing(object_id)?;
                self.record_failure(object_id, &token, &err);
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        if !required {
            debug!(%object_id, "index is up to date");
            return Ok(BuildOutcome::UpToDate);
        }

        let kind = self.support.table_kind(object_id)?;
        let token = self.tracker.reset_to_processing(object_id)?;
        info!(%object_id, %kind, "building index");

        self.build(object_id, kind, &token).map_err(|err| {
            self.record_failure(object_id, &token, &err);
            err
        })
    }

    fn record_failure(&self, object_id: &ObjectId, token: &str, err: &IndexError) {
        error!(%object_id, error = %err, "index build failed");
        if let Err(write_err) =
            self.tracker
                .complete_failed(object_id, token, err.to_string(), error_detail(err))
        {
            error!(%object_id, error = %write_err, "could not record build failure");
        }
    }

    fn build(&self, object_id: &ObjectId, kind: TableKind, token: &str) -> IndexResult<BuildOutcome> {
        self.index.delete_index(object_id)?;

        let schema = self.support.schema();
        let column_ids = schema.column_ids(object_id)?;
        let schema_fingerprint = SchemaFingerprint::of_columns(&column_ids);
        let columns = schema.column_models(object_id)?;

        let (rows, version) = match kind {
            TableKind::RowTable => {
                self.index.set_index_schema(object_id, &columns)?;
                let version = VersionFingerprint::ChangeSequence(
                    self.support.truth().last_change_number(object_id)?,
                );
                (0, version)
            }
            TableKind::ReplicationView => self.populate_view(object_id, token, &columns)?,
        };

        self.index.optimize_indices(object_id)?;

        match self
            .tracker
            .complete_available(object_id, token, version, schema_fingerprint)?
        {
            Completion::Applied => {
                info!(%object_id, rows, %version, "index available");
                Ok(BuildOutcome::Built { rows, version })
            }
            Completion::Superseded => Ok(BuildOutcome::Superseded),
        }
    }

    fn populate_view(
        &self,
        object_id: &ObjectId,
        token: &str,
        columns: &[ColumnModel],
    ) -> IndexResult<(u64, VersionFingerprint)> {
        let schema = self.support.expanded_view_schema(columns)?;
        let (scope, containers) = self.support.view_containers(object_id)?;

        // Reconcile before copying so the copy does not race a stale replica.
        self.support
            .reconciliation()
            .trigger_scope_reconciliation(scope.type_mask, &containers);

        self.tracker.update_progress(
            object_id,
            token,
            "Copying data to view...",
            0,
            containers.len() as u64,
        )?;

        self.index.set_index_schema(object_id, &schema)?;
        let replication = self.support.replication();
        let rows = replication.populate(
            self.index.as_ref(),
            object_id,
            &containers,
            scope.type_mask,
            &schema,
        )?;
        let version = replication.compute_crc(&containers, scope.type_mask)?;
        Ok((rows, version))
    }
}
