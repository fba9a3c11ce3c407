//! CLI command implementations.

pub mod simulate;

use tablesync_core::IndexError;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The engine rejected an operation.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Output could not be serialized.
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}
