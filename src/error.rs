//! Custom error types for influxdb-backup
//!
//! This module defines the error hierarchy for the backup engine using thiserror
//! for ergonomic error definitions. Errors fall into two scopes: pre-flight
//! errors that abort a run before any window is processed, and window-scoped
//! errors that are recorded against a single window while its siblings continue.

use thiserror::Error;

/// The main error type for backup operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackupError {
    /// Invalid options, configuration file, or target directory
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A fetch failure worth retrying (network, timeout, rate limit)
    #[error("Transient fetch error: {0}")]
    Transient(String),

    /// A fetch failure that retrying cannot fix (bad request, auth)
    #[error("Terminal fetch error: {0}")]
    Terminal(String),

    /// Transient failures persisted through every allowed attempt
    #[error("Fetch failed after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// Snapshot could not be committed to disk
    #[error("Write error: {0}")]
    Write(String),

    /// The run was interrupted before the window was claimed
    #[error("Backup cancelled")]
    Cancelled,

    /// The worker processing the window panicked or was aborted
    #[error("Worker aborted: {0}")]
    WorkerAborted(String),

    /// The data source could not be reached before the run started
    #[error("Data source unavailable: {0}")]
    Unavailable(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// YAML configuration parse errors
    #[error("YAML error: {0}")]
    Yaml(String),
}

impl BackupError {
    /// Create an invalid configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Check if this error is eligible for retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Check if this error aborts the whole run rather than a single window
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::Unavailable(_) | Self::Yaml(_)
        )
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for BackupError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

impl From<reqwest::Error> for BackupError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return classify_status(status.as_u16(), &err.to_string());
        }

        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            Self::Transient(err.to_string())
        } else {
            Self::Terminal(err.to_string())
        }
    }
}

/// Classify an HTTP status code returned by the data source
///
/// Rate limiting and server-side errors are transient; every other
/// non-success status is terminal.
pub fn classify_status(status: u16, message: &str) -> BackupError {
    match status {
        408 | 429 | 500..=599 => BackupError::Transient(format!("HTTP {}: {}", status, message)),
        _ => BackupError::Terminal(format!("HTTP {}: {}", status, message)),
    }
}

/// Result type alias for backup operations
pub type Result<T> = std::result::Result<T, BackupError>;
