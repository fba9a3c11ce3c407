//! Status rows and the index state machine.

use crate::error::{IndexError, IndexResult};
use crate::fingerprint::{SchemaFingerprint, VersionFingerprint};
use crate::types::ObjectId;
use serde::{Deserialize, Serialize};

/// The state of an object's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableState {
    /// The index is being (re)built and must not be queried.
    Processing,
    /// The index is complete and matches the stamped fingerprints.
    Available,
    /// The last build failed.
    Failed,
}

impl TableState {
    /// Returns true if moving from `self` to `next` is a legal transition.
    ///
    /// Entering PROCESSING is always legal (a reset issues a new token, also
    /// for a stuck PROCESSING row). Leaving PROCESSING is the only way to
    /// reach AVAILABLE or FAILED.
    pub fn can_transition_to(&self, next: TableState) -> bool {
        match next {
            TableState::Processing => true,
            TableState::Available | TableState::Failed => *self == TableState::Processing,
        }
    }
}

/// Advisory build progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// What the builder is doing.
    pub message: String,
    /// Units done.
    pub current: u64,
    /// Units expected.
    pub total: u64,
}

/// Durable record of a failed build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusError {
    /// Short message.
    pub message: String,
    /// Full detail, including the cause chain.
    pub detail: String,
}

/// The status row of one table or view index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStatus {
    /// The indexed object.
    pub object_id: ObjectId,
    /// Current state.
    pub state: TableState,
    /// Fencing token issued on the last entry into PROCESSING.
    pub reset_token: String,
    /// When the row last changed state or progress (epoch millis).
    pub changed_on: u64,
    /// When the current PROCESSING run started (epoch millis).
    pub started_on: u64,
    /// Progress of the current build.
    pub progress: Option<Progress>,
    /// Error of the last failed build.
    pub error: Option<StatusError>,
    /// Version fingerprint stamped on the last successful build.
    pub version_fingerprint: Option<VersionFingerprint>,
    /// Schema fingerprint stamped on the last successful build.
    pub schema_fingerprint: Option<SchemaFingerprint>,
}

impl TableStatus {
    /// Creates a fresh PROCESSING row.
    pub fn processing(object_id: ObjectId, reset_token: String, now: u64) -> Self {
        Self {
            object_id,
            state: TableState::Processing,
            reset_token,
            changed_on: now,
            started_on: now,
            progress: None,
            error: None,
            version_fingerprint: None,
            schema_fingerprint: None,
        }
    }

    /// Returns true if the index may be queried.
    pub fn is_available(&self) -> bool {
        self.state == TableState::Available
    }

    /// Returns true if the stamped fingerprints equal the given ones.
    pub fn fingerprints_match(
        &self,
        version: &VersionFingerprint,
        schema: &SchemaFingerprint,
    ) -> bool {
        self.version_fingerprint.as_ref() == Some(version)
            && self.schema_fingerprint.as_ref() == Some(schema)
    }
}

/// Outcome of a token-fenced status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The token was current and the write took effect.
    Applied,
    /// The token was stale; another writer owns the row and nothing changed.
    Superseded,
}

impl Completion {
    /// Returns true if the write took effect.
    pub fn is_applied(&self) -> bool {
        matches!(self, Completion::Applied)
    }

    /// Surfaces a superseded write as [`IndexError::ConflictingUpdate`].
    ///
    /// For callers that require exclusive ownership of the token.
    pub fn require_owned(self, object_id: &ObjectId, token: &str) -> IndexResult<()> {
        match self {
            Completion::Applied => Ok(()),
            Completion::Superseded => Err(IndexError::conflicting_update(
                object_id.to_string(),
                token,
            )),
        }
    }
}

/// Result of looking up a status row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLookup {
    /// A row exists.
    Found(TableStatus),
    /// The object exists but has no row yet.
    ObjectExistsNoStatus,
    /// The object itself does not exist.
    ObjectMissing,
}
