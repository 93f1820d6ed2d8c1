//! Run-level error types.

use thiserror::Error;

use forgesync_directory::DirectoryError;
use forgesync_forge::ForgeError;

/// Fatal error aborting a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The named instance does not exist in the configuration.
    #[error("unknown forge instance: {0}")]
    UnknownInstance(String),

    /// Directory failure. Always fatal: the directory is authoritative
    /// and partial data is unsafe to reconcile against.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Forge failure that was not recoverable (or recovery was not
    /// requested).
    #[error(transparent)]
    Forge(#[from] ForgeError),

    /// Invariant violation inside the engine.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SyncError {
    pub fn internal(message: impl Into<String>) -> Self {
        SyncError::Internal {
            message: message.into(),
        }
    }
}

/// Result type for reconciliation operations.
pub type SyncResult<T> = Result<T, SyncError>;
