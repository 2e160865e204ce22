//! Unified error handling for the flight-logbook library.
//!
//! All fallible operations return [`LogbookError`] so callers match on one
//! enum instead of mixed Option/String failures.

use thiserror::Error;

/// Unified error type for logbook operations.
#[derive(Error, Debug)]
pub enum LogbookError {
    /// Server answered with a non-success status code.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Request could not be sent or its body could not be read.
    #[cfg(feature = "http")]
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Telemetry CSV could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Telemetry log header matched no known radio or flight-controller format.
    #[error("unknown log format: {0}")]
    UnknownLogFormat(String),

    /// Telemetry log was readable but unusable (empty, no fix, too short).
    #[error("log '{filename}' rejected: {reason}")]
    LogRejected { filename: String, reason: String },

    /// Filter key is not part of the page's schema.
    #[error("unknown filter key: {0}")]
    UnknownFilter(String),

    /// Filter value kind does not match what the schema expects for the key.
    #[error("filter '{key}' expects {expected}, got {got}")]
    FilterKind {
        key: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for logbook operations.
pub type Result<T> = std::result::Result<T, LogbookError>;
