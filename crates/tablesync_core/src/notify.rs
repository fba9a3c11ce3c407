//! Change notification.
//!
//! Status transitions wake asynchronous workers by publishing
//! [`ChangeMessage`]s. Messages are staged in a [`UnitOfWork`] and only
//! reach the notifier when the work commits; an error that aborts the work
//! before `commit()` drops the staged messages.

use crate::types::{ObjectId, TableKind};
use serde::{Deserialize, Serialize};

/// Kind of change a message announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    /// The object was created.
    Create,
    /// The object changed; its index needs work.
    Update,
    /// The object was deleted.
    Delete,
}

/// A message telling workers that an indexed object changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMessage {
    /// The table or view.
    pub object_id: ObjectId,
    /// Table or view.
    pub object_type: TableKind,
    /// What happened.
    pub change_type: ChangeType,
}

impl ChangeMessage {
    /// Creates an update message.
    pub fn update(object_id: ObjectId, object_type: TableKind) -> Self {
        Self {
            object_id,
            object_type,
            change_type: ChangeType::Update,
        }
    }

    /// Creates a delete message.
    pub fn delete(object_id: ObjectId, object_type: TableKind) -> Self {
        Self {
            object_id,
            object_type,
            change_type: ChangeType::Delete,
        }
    }
}

/// Publishes change messages and reconciliation requests.
pub trait ChangeNotifier: Send + Sync {
    /// Publishes messages from a committed unit of work, in order.
    fn publish(&self, messages: Vec<ChangeMessage>);

    /// Queues containers for re-replication.
    ///
    /// Best effort and at-least-once; must not block on the queue's consumers.
    fn send_to_reconciliation_queue(&self, container_ids: Vec<u64>);
}

/// Messages staged until the surrounding work commits.
#[derive(Debug, Default)]
#[must_use = "staged messages are discarded unless the unit of work is committed"]
pub struct UnitOfWork {
    staged: Vec<ChangeMessage>,
}

impl UnitOfWork {
    /// Starts an empty unit of work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a message to be sent if and when this work commits.
    pub fn send_after_commit(&mut self, message: ChangeMessage) {
        self.staged.push(message);
    }

    /// Number of staged messages.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Commits, publishing every staged message.
    pub fn commit(self, notifier: &dyn ChangeNotifier) {
        if !self.staged.is_empty() {
            notifier.publish(self.staged);
        }
    }
}
