//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Error raised while loading or validating the configuration file.
///
/// Every configuration error is fatal: the sync never touches the
/// network with a partially-validated configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// The configuration file does not exist, but the distributed
    /// sample next to it does.
    #[error(
        "configuration file not found: {path}\n\
         A sample is available at {dist}; copy it to {path} and fill in your settings."
    )]
    NotFoundWithDist { path: PathBuf, dist: PathBuf },

    /// The file exists but could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for the expected schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A field value failed validation.
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    /// Create a validation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
