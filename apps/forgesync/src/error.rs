//! CLI error type and exit codes.

use thiserror::Error;

use forgesync_config::ConfigError;
use forgesync_reconcile::SyncError;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Fatal CLI error. Every variant exits with code 1.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl CliError {
    /// Exit code for this error.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Print the error to stderr.
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();
        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {self}");
        } else {
            eprintln!("Error: {self}");
        }
    }
}
