//! Backup request
//!
//! A `BackupRequest` is resolved once per invocation by the mode selector and
//! is read-only afterwards. It carries the single wall-clock snapshot (`now`)
//! every window boundary of the run is computed from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::width::WindowWidth;
use super::window::TimeRange;
use crate::error::BackupError;

/// Full vs incremental backup strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupMode {
    /// A single window spanning the whole range
    Full,
    /// Consecutive windows of a fixed width
    Incremental(WindowWidth),
}

impl BackupMode {
    /// Directory label for snapshots produced in this mode
    pub fn label(&self) -> String {
        match self {
            Self::Full => "full".to_string(),
            Self::Incremental(width) => width.to_string(),
        }
    }

    pub fn is_incremental(&self) -> bool {
        matches!(self, Self::Incremental(_))
    }
}

/// On-disk snapshot encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// One JSON document with window metadata and a `records` array
    #[default]
    Json,
    /// One record per line
    Jsonl,
}

impl SnapshotFormat {
    /// File extension for snapshots in this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Jsonl => "jsonl",
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for SnapshotFormat {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            other => Err(BackupError::config(format!(
                "unknown snapshot format '{}': expected json or jsonl",
                other
            ))),
        }
    }
}

/// A fully resolved, validated backup invocation
#[derive(Debug, Clone)]
pub struct BackupRequest {
    /// Requested range; `None` means "all time up to `now`" (full mode only)
    pub range: Option<TimeRange>,
    /// Backup strategy
    pub mode: BackupMode,
    /// Directory the snapshot files are committed to
    pub target_dir: PathBuf,
    /// Re-fetch and replace windows that already have a snapshot
    pub overwrite: bool,
    /// Number of concurrent workers, at least 1
    pub worker_count: usize,
    /// Snapshot encoding
    pub format: SnapshotFormat,
    /// Wall-clock time captured once when the request was resolved
    pub now: DateTime<Utc>,
}

impl BackupRequest {
    /// Same request, committed to a different directory
    ///
    /// Used to run one resolved request against several databases.
    pub fn with_target_dir(&self, target_dir: PathBuf) -> Self {
        Self {
            target_dir,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_label() {
        assert_eq!(BackupMode::Full.label(), "full");
        let width: WindowWidth = "8h".parse().unwrap();
        assert_eq!(BackupMode::Incremental(width).label(), "8h");
    }

    #[test]
    fn test_snapshot_format_parse() {
        assert_eq!("json".parse::<SnapshotFormat>().unwrap(), SnapshotFormat::Json);
        assert_eq!("JSONL".parse::<SnapshotFormat>().unwrap(), SnapshotFormat::Jsonl);
        assert!("csv".parse::<SnapshotFormat>().is_err());
        assert_eq!(SnapshotFormat::Jsonl.extension(), "jsonl");
    }
}
