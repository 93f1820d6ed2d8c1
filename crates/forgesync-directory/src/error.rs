//! Directory error types.
//!
//! Any directory failure aborts the whole run: the directory is the
//! authoritative side, and reconciling against partial data could
//! mass-disable forge accounts.

use thiserror::Error;

/// Error raised by the directory client.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Failed to establish the connection.
    #[error("directory connect failed: {message}")]
    Connect {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The bind was rejected.
    #[error("directory bind failed: {message}")]
    Bind { message: String },

    /// A search returned a non-success result code.
    #[error("directory search failed: {message}")]
    Search { message: String },

    /// Protocol or transport failure mid-operation.
    #[error("directory transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DirectoryError {
    /// Short kind tag for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DirectoryError::Connect { .. } => "connect",
            DirectoryError::Bind { .. } => "bind",
            DirectoryError::Search { .. } => "search",
            DirectoryError::Transport { .. } => "transport",
        }
    }

    pub fn connect(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::Connect {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn bind(message: impl Into<String>) -> Self {
        DirectoryError::Bind {
            message: message.into(),
        }
    }

    pub fn search(message: impl Into<String>) -> Self {
        DirectoryError::Search {
            message: message.into(),
        }
    }

    pub fn transport(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
