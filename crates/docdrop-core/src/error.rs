//! Error types module
//!
//! `PlmError` covers every failure a remote PLM call can produce: transport
//! problems, non-success HTTP statuses, partial errors reported inside an
//! otherwise successful service response, and malformed payloads.
//!
//! Per-file upload failures are not errors; the coordinator records them as
//! data in its outcome. `PlmError` only surfaces from whole service calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like invalid input
    Debug,
    /// Warning level - for recoverable issues like a flaky connection
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// One error value from a service's `ServiceData.partialErrors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for PartialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlmError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{operation} failed with HTTP status {status}: {body}")]
    Http {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{operation} reported {} partial error(s): {}", .errors.len(), join_partial(.errors))]
    PartialErrors {
        operation: String,
        errors: Vec<PartialError>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Result type for remote PLM operations
pub type PlmResult<T> = Result<T, PlmError>;

fn join_partial(errors: &[PartialError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<anyhow::Error> for PlmError {
    fn from(err: anyhow::Error) -> Self {
        PlmError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for PlmError {
    fn from(err: io::Error) -> Self {
        PlmError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for PlmError {
    fn from(err: serde_json::Error) -> Self {
        PlmError::InvalidResponse(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, log_level).
fn static_metadata(err: &PlmError) -> (&'static str, bool, LogLevel) {
    match err {
        PlmError::Transport(_) => ("TRANSPORT_ERROR", true, LogLevel::Warn),
        PlmError::Http { status, .. } if *status == 429 || *status >= 500 => {
            ("UPSTREAM_UNAVAILABLE", true, LogLevel::Warn)
        }
        PlmError::Http { .. } => ("HTTP_ERROR", false, LogLevel::Error),
        PlmError::PartialErrors { .. } => ("PARTIAL_ERRORS", false, LogLevel::Error),
        PlmError::InvalidResponse(_) => ("INVALID_RESPONSE", false, LogLevel::Error),
        PlmError::Config(_) => ("CONFIG_ERROR", false, LogLevel::Error),
        PlmError::InvalidInput(_) => ("INVALID_INPUT", false, LogLevel::Debug),
        PlmError::Internal(_) | PlmError::InternalWithSource { .. } => {
            ("INTERNAL_ERROR", false, LogLevel::Error)
        }
    }
}

impl PlmError {
    /// Machine-readable error code (e.g., "TRANSPORT_ERROR")
    pub fn error_code(&self) -> &'static str {
        static_metadata(self).0
    }

    /// Whether repeating the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        static_metadata(self).1
    }

    /// Log level for this error
    pub fn log_level(&self) -> LogLevel {
        static_metadata(self).2
    }

    /// Code of the first partial error, if the service reported any.
    pub fn first_partial_code(&self) -> Option<i64> {
        match self {
            PlmError::PartialErrors { errors, .. } => errors.first().map(|e| e.code),
            _ => None,
        }
    }
}
