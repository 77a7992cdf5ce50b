//! CLI error types.

use agenda_core::TracingError;
use agenda_providers::CalendarError;
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end a CLI invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Bad command-line argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Authorization or calendar API failure.
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    /// Logging could not be set up.
    #[error("failed to initialize logging: {0}")]
    Tracing(#[from] TracingError),

    /// Output could not be serialized.
    #[error("failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),
}
