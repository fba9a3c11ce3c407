//! Error types for the index synchronization engine.

use std::error::Error as StdError;
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors that can occur while synchronizing a table or view index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The object (or its status row) does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// What was missing.
        message: String,
    },

    /// A write presented a reset token that no longer matches the stored one.
    #[error("conflicting update for {object_id}: token {token} is no longer current")]
    ConflictingUpdate {
        /// The object whose status was written.
        object_id: String,
        /// The stale token.
        token: String,
    },

    /// A view scope is larger than the configured container limit.
    #[error("{0}")]
    LimitExceeded(String),

    /// An argument failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller is not allowed to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A lock could not be acquired before the timeout elapsed.
    #[error("lock unavailable: {key} (waited {timeout:?})")]
    LockUnavailable {
        /// The lock key.
        key: String,
        /// How long the caller waited.
        timeout: Duration,
    },

    /// A truth or status store failed.
    #[error("store error: {0}")]
    Store(String),

    /// The replication store failed.
    #[error("replication error: {0}")]
    Replication(String),

    /// The index store failed.
    #[error("index error: {0}")]
    Index(String),
}

impl IndexError {
    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a conflicting update error.
    pub fn conflicting_update(object_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self::ConflictingUpdate {
            object_id: object_id.into(),
            token: token.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a lock unavailable error.
    pub fn lock_unavailable(key: impl Into<String>, timeout: Duration) -> Self {
        Self::LockUnavailable {
            key: key.into(),
            timeout,
        }
    }

    /// Returns true if a worker should retry the operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IndexError::LockUnavailable { .. }
                | IndexError::Store(_)
                | IndexError::Replication(_)
                | IndexError::Index(_)
        )
    }

    /// Returns true for a stale-token rejection.
    pub fn is_conflict(&self) -> bool {
        matches!(self, IndexError::ConflictingUpdate { .. })
    }

    /// Returns true if the object was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexError::NotFound { .. })
    }
}

/// Renders an error and its source chain, one cause per line.
///
/// Used as the durable `detail` of a FAILED status.
pub fn error_detail(error: &(dyn StdError + 'static)) -> String {
    let mut detail = format!("{error:?}");
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(detail, "\ncaused by: {cause}");
        source = cause.source();
    }
    detail
}
