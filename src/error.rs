//! Error types for the export pipeline.

use thiserror::Error;

/// Errors that can occur while converting or writing calendar events.
#[derive(Error, Debug)]
pub enum ExportError {
    /// An upstream record carried neither an all-day date nor a timestamp
    /// on one of its boundaries.
    #[error("event '{0}' has neither a date nor a dateTime boundary")]
    MalformedRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for export operations.
pub type ExportResult<T> = Result<T, ExportError>;
