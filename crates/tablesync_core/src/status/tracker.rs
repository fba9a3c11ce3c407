//! The per-object index state machine.

use crate::clock::Clock;
use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::fingerprint::{SchemaFingerprint, VersionFingerprint};
use crate::notify::{ChangeMessage, ChangeNotifier, UnitOfWork};
use crate::status::model::{Completion, Progress, StatusError, StatusLookup, TableState, TableStatus};
use crate::status::store::StatusStore;
use crate::support::TableSupport;
use crate::types::{ObjectId, TableKind};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tracks the status of every table and view index.
///
/// Rows are created lazily on first lookup, reset to PROCESSING when stale,
/// and completed only by the holder of the current reset token.
pub struct StatusTracker {
    store: Arc<dyn StatusStore>,
    support: Arc<TableSupport>,
    notifier: Arc<dyn ChangeNotifier>,
    clock: Arc<dyn Clock>,
    config: IndexConfig,
}

impl StatusTracker {
    /// Creates a tracker.
    pub fn new(
        store: Arc<dyn StatusStore>,
        support: Arc<TableSupport>,
        notifier: Arc<dyn ChangeNotifier>,
        clock: Arc<dyn Clock>,
        config: IndexConfig,
    ) -> Self {
        Self {
            store,
            support,
            notifier,
            clock,
            config,
        }
    }

    /// Looks up the status row without creating it.
    pub fn lookup(&self, object_id: &ObjectId) -> IndexResult<StatusLookup> {
        if !self.support.exists(object_id)? {
            return Ok(StatusLookup::ObjectMissing);
        }
        Ok(match self.store.get(object_id)? {
            Some(status) => StatusLookup::Found(status),
            None => StatusLookup::ObjectExistsNoStatus,
        })
    }

    /// Returns the status, creating or resetting it when the index needs work.
    ///
    /// - No row: a PROCESSING row is created and an update is requested.
    /// - PROCESSING or FAILED unchanged for longer than the staleness
    ///   timeout: reset with a new token and an update is requested.
    /// - AVAILABLE with fingerprints that no longer match the truth: reset
    ///   and an update is requested.
    ///
    /// Anything else is returned as-is.
    pub fn get_or_create_status(&self, object_id: &ObjectId) -> IndexResult<TableStatus> {
        match self.lookup(object_id)? {
            StatusLookup::ObjectMissing => {
                Err(IndexError::not_found(format!("{object_id} does not exist")))
            }
            StatusLookup::ObjectExistsNoStatus => {
                debug!(%object_id, "no status yet, creating");
                self.set_to_processing_and_trigger_update(object_id)
            }
            StatusLookup::Found(status) => match status.state {
                TableState::Processing | TableState::Failed => {
                    if self
                        .clock
                        .has_expired(self.config.staleness_timeout, status.changed_on)
                    {
                        info!(
                            %object_id,
                            state = ?status.state,
                            changed_on = status.changed_on,
                            "status is stale, resetting"
                        );
                        self.set_to_processing_and_trigger_update(object_id)
                    } else {
                        Ok(status)
                    }
                }
                TableState::Available => {
                    if self.fingerprints_match(object_id, &status)? {
                        Ok(status)
                    } else {
                        info!(%object_id, "index is out of date, resetting");
                        self.set_to_processing_and_trigger_update(object_id)
                    }
                }
            },
        }
    }

    /// Enters PROCESSING with a new token, which is returned.
    pub fn reset_to_processing(&self, object_id: &ObjectId) -> IndexResult<String> {
        let token = self
            .store
            .reset_to_processing(object_id, self.clock.now_millis())?;
        debug!(%object_id, %token, "reset to processing");
        Ok(token)
    }

    /// Resets to PROCESSING and requests an update from the workers.
    ///
    /// The update message is published only once the reset has been stored.
    pub fn set_to_processing_and_trigger_update(
        &self,
        object_id: &ObjectId,
    ) -> IndexResult<TableStatus> {
        let kind = self.support.table_kind(object_id)?;
        let mut work = UnitOfWork::new();
        self.reset_to_processing(object_id)?;
        work.send_after_commit(ChangeMessage::update(*object_id, kind));
        let status = self.required(object_id)?;
        work.commit(self.notifier.as_ref());
        Ok(status)
    }

    /// Marks the index AVAILABLE and stamps its fingerprints.
    ///
    /// A stale token leaves the row untouched and yields
    /// [`Completion::Superseded`].
    pub fn complete_available(
        &self,
        object_id: &ObjectId,
        token: &str,
        version: VersionFingerprint,
        schema: SchemaFingerprint,
    ) -> IndexResult<Completion> {
        let result = self.store.attempt_set_available(
            object_id,
            token,
            version,
            schema,
            self.clock.now_millis(),
        );
        self.completion(object_id, token, "available", result)
    }

    /// Marks the index FAILED.
    pub fn complete_failed(
        &self,
        object_id: &ObjectId,
        token: &str,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> IndexResult<Completion> {
        let error = StatusError {
            message: message.into(),
            detail: detail.into(),
        };
        let result =
            self.store
                .attempt_set_failed(object_id, token, error, self.clock.now_millis());
        self.completion(object_id, token, "failed", result)
    }

    /// Records build progress. Advisory.
    pub fn update_progress(
        &self,
        object_id: &ObjectId,
        token: &str,
        message: impl Into<String>,
        current: u64,
        total: u64,
    ) -> IndexResult<Completion> {
        let progress = Progress {
            message: message.into(),
            current,
            total,
        };
        let result = self.store.attempt_update_progress(
            object_id,
            token,
            progress,
            self.clock.now_millis(),
        );
        self.completion(object_id, token, "progress", result)
    }

    /// Returns true if a status row exists and its fingerprints match the truth.
    pub fn is_index_synchronized(&self, object_id: &ObjectId) -> IndexResult<bool> {
        match self.store.get(object_id)? {
            Some(status) => self.fingerprints_match(object_id, &status),
            None => Ok(false),
        }
    }

    /// Announces that an object was deleted.
    ///
    /// Workers react by dropping the index and the status row.
    pub fn set_deleted(&self, object_id: &ObjectId, kind: TableKind) {
        let mut work = UnitOfWork::new();
        work.send_after_commit(ChangeMessage::delete(*object_id, kind));
        work.commit(self.notifier.as_ref());
        info!(%object_id, "object deleted");
    }

    /// Removes the status row of a deleted object.
    pub fn remove_status(&self, object_id: &ObjectId) -> IndexResult<bool> {
        self.store.delete(object_id)
    }

    /// Reads the status row.
    pub fn status(&self, object_id: &ObjectId) -> IndexResult<Option<TableStatus>> {
        self.store.get(object_id)
    }

    fn required(&self, object_id: &ObjectId) -> IndexResult<TableStatus> {
        self.store
            .get(object_id)?
            .ok_or_else(|| IndexError::not_found(format!("status for {object_id}")))
    }

    fn fingerprints_match(&self, object_id: &ObjectId, status: &TableStatus) -> IndexResult<bool> {
        let (version, schema) = self.support.current_fingerprints(object_id)?;
        Ok(status.fingerprints_match(&version, &schema))
    }

    fn completion(
        &self,
        object_id: &ObjectId,
        token: &str,
        what: &str,
        result: IndexResult<()>,
    ) -> IndexResult<Completion> {
        match result {
            Ok(()) => {
                debug!(%object_id, what, "status write applied");
                Ok(Completion::Applied)
            }
            // A missing row means the object was deleted since the reset.
            Err(err) if err.is_conflict() || err.is_not_found() => {
                warn!(%object_id, %token, what, "ignoring status write with stale token");
                Ok(Completion::Superseded)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::fixture::{Fixture, F1, P1, P2};
    use crate::{
        ChangeType, Completion, IndexError, ObjectId, SchemaFingerprint, StatusLookup, TableKind,
        TableState, VersionFingerprint, ViewTypeMask,
    };
    use std::time::Duration;

    const VIEW: u64 = 500;
    const TEN_MINUTES: Duration = Duration::from_secs(600);

    fn built_view() -> Fixture {
        let fixture = Fixture::with_projects();
        fixture.create_view(VIEW, &[P1, P2], ViewTypeMask::FILE);
        fixture
            .service
            .create_or_update_index(&ObjectId::latest(VIEW), Duration::from_secs(1))
            .unwrap();
        fixture
    }

    #[test]
    fn missing_object_is_not_found() {
        let fixture = Fixture::new();
        let err = fixture
            .service
            .tracker()
            .get_or_create_status(&ObjectId::latest(404))
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            fixture.service.tracker().lookup(&ObjectId::latest(404)).unwrap(),
            StatusLookup::ObjectMissing
        );
    }

    #[test]
    fn first_lookup_creates_processing_row_and_requests_update() {
        let fixture = Fixture::with_projects();
        fixture.create_table(300, Some(3));
        let id = ObjectId::latest(300);
        let tracker = fixture.service.tracker();
        assert_eq!(tracker.lookup(&id).unwrap(), StatusLookup::ObjectExistsNoStatus);

        let rx = fixture.feed.subscribe();
        let status = tracker.get_or_create_status(&id).unwrap();
        assert_eq!(status.state, TableState::Processing);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.message.object_id, id);
        assert_eq!(event.message.object_type, TableKind::RowTable);
        assert_eq!(event.message.change_type, ChangeType::Update);
        assert!(matches!(tracker.lookup(&id).unwrap(), StatusLookup::Found(_)));
    }

    #[test]
    fn available_and_current_is_idempotent() {
        let fixture = built_view();
        let id = ObjectId::latest(VIEW);
        let tracker = fixture.service.tracker();
        let rx = fixture.feed.subscribe();

        let first = tracker.get_or_create_status(&id).unwrap();
        let second = tracker.get_or_create_status(&id).unwrap();
        assert_eq!(first.state, TableState::Available);
        assert_eq!(first.reset_token, second.reset_token);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stale_processing_is_reset_with_new_token() {
        let fixture = Fixture::with_projects();
        fixture.create_table(300, None);
        let id = ObjectId::latest(300);
        let tracker = fixture.service.tracker();
        let original = tracker.get_or_create_status(&id).unwrap();

        fixture.clock.advance(TEN_MINUTES);
        let unchanged = tracker.get_or_create_status(&id).unwrap();
        assert_eq!(unchanged.reset_token, original.reset_token);

        fixture.clock.advance(Duration::from_millis(1));
        let reset = tracker.get_or_create_status(&id).unwrap();
        assert_eq!(reset.state, TableState::Processing);
        assert_ne!(reset.reset_token, original.reset_token);
    }

    #[test]
    fn failed_is_retried_after_staleness_timeout() {
        let fixture = Fixture::with_projects();
        fixture.create_table(300, None);
        let id = ObjectId::latest(300);
        let tracker = fixture.service.tracker();
        let token = tracker.get_or_create_status(&id).unwrap().reset_token;
        tracker
            .complete_failed(&id, &token, "boom", "boom detail")
            .unwrap();

        let failed = tracker.get_or_create_status(&id).unwrap();
        assert_eq!(failed.state, TableState::Failed);
        assert_eq!(failed.error.unwrap().message, "boom");

        fixture.clock.advance(TEN_MINUTES + Duration::from_secs(1));
        let retried = tracker.get_or_create_status(&id).unwrap();
        assert_eq!(retried.state, TableState::Processing);
        assert!(retried.error.is_none());
        assert_ne!(retried.reset_token, token);
    }

    #[test]
    fn available_with_changed_truth_is_reset() {
        let fixture = built_view();
        let id = ObjectId::latest(VIEW);
        let tracker = fixture.service.tracker();
        let before = tracker.get_or_create_status(&id).unwrap();
        assert!(tracker.is_index_synchronized(&id).unwrap());

        fixture.add_entity(112, F1, crate::EntityType::File);
        assert!(!tracker.is_index_synchronized(&id).unwrap());
        let after = tracker.get_or_create_status(&id).unwrap();
        assert_eq!(after.state, TableState::Processing);
        assert_ne!(after.reset_token, before.reset_token);
    }

    #[test]
    fn stale_token_completion_is_superseded() {
        let fixture = Fixture::with_projects();
        fixture.create_table(300, Some(1));
        let id = ObjectId::latest(300);
        let tracker = fixture.service.tracker();
        let stale = tracker.reset_to_processing(&id).unwrap();
        let current = tracker.reset_to_processing(&id).unwrap();
        let before = tracker.status(&id).unwrap();

        let completion = tracker
            .complete_available(
                &id,
                &stale,
                VersionFingerprint::ChangeSequence(Some(1)),
                SchemaFingerprint::of_columns::<&str>(&[]),
            )
            .unwrap();
        assert_eq!(completion, Completion::Superseded);
        assert_eq!(
            tracker.complete_failed(&id, &stale, "late", "late").unwrap(),
            Completion::Superseded
        );
        assert_eq!(
            tracker.update_progress(&id, &stale, "late", 1, 2).unwrap(),
            Completion::Superseded
        );
        assert_eq!(tracker.status(&id).unwrap(), before);

        let err = completion.require_owned(&id, &stale).unwrap_err();
        assert!(matches!(err, IndexError::ConflictingUpdate { .. }));

        assert!(tracker
            .update_progress(&id, &current, "copying", 1, 2)
            .unwrap()
            .is_applied());
        let progress = tracker.status(&id).unwrap().unwrap().progress.unwrap();
        assert_eq!((progress.current, progress.total), (1, 2));
    }

    #[test]
    fn set_deleted_publishes_delete() {
        let fixture = Fixture::with_projects();
        let rx = fixture.feed.subscribe();
        let id = ObjectId::latest(300);
        fixture
            .service
            .tracker()
            .set_deleted(&id, TableKind::ReplicationView);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.message.change_type, ChangeType::Delete);
        assert_eq!(event.message.object_type, TableKind::ReplicationView);
    }
}
