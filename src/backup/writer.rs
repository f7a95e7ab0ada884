//! Snapshot writer
//!
//! Serializes one window's record set and commits it under the window's
//! deterministic filename. Every commit goes through a temporary file in the
//! target directory followed by an atomic publish, so a committed snapshot is
//! always complete.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BackupError, Result};
use crate::models::{BackupRequest, RecordSet, SnapshotFormat, TimeWindow};
use crate::storage::{ensure_dir, stage_file, Published, StagedFile};

/// Current snapshot document schema version
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Snapshot document written in `json` format
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotDocument<R = Value> {
    /// Schema version for migration support
    pub schema_version: u32,
    /// Window the records were fetched for
    pub window: TimeWindow,
    pub record_count: usize,
    pub records: Vec<R>,
}

#[derive(Serialize)]
struct SnapshotDocumentRef<'a> {
    schema_version: u32,
    window: &'a TimeWindow,
    record_count: usize,
    records: &'a [Value],
}

/// What a commit did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Snapshot committed under its final name
    Written { path: PathBuf, records: usize },
    /// A snapshot already existed and overwrite is disabled
    Skipped(PathBuf),
}

/// Commits snapshots for one target directory
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    target_dir: PathBuf,
    overwrite: bool,
    format: SnapshotFormat,
}

impl SnapshotWriter {
    pub fn new(target_dir: impl Into<PathBuf>, overwrite: bool, format: SnapshotFormat) -> Self {
        Self {
            target_dir: target_dir.into(),
            overwrite,
            format,
        }
    }

    pub fn from_request(request: &BackupRequest) -> Self {
        Self::new(request.target_dir.clone(), request.overwrite, request.format)
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// Create the target directory if needed
    ///
    /// Fails with `InvalidConfiguration` if the target exists but is not a
    /// directory.
    pub fn prepare(&self) -> Result<()> {
        ensure_dir(&self.target_dir)
    }

    /// Deterministic final path for a window's snapshot
    pub fn snapshot_path(&self, window: &TimeWindow) -> PathBuf {
        self.target_dir
            .join(format!("{}.{}", window.file_stem(), self.format.extension()))
    }

    /// Check if a committed snapshot exists for the window
    pub fn exists(&self, window: &TimeWindow) -> bool {
        self.snapshot_path(window).exists()
    }

    /// Serialize records into a temporary file without publishing it
    pub fn stage(&self, window: &TimeWindow, records: &[Value]) -> Result<StagedFile> {
        let path = self.snapshot_path(window);
        let format = self.format;

        stage_file(&path, |writer| {
            match format {
                SnapshotFormat::Json => {
                    let document = SnapshotDocumentRef {
                        schema_version: SNAPSHOT_SCHEMA_VERSION,
                        window,
                        record_count: records.len(),
                        records,
                    };
                    serde_json::to_writer(&mut *writer, &document).map_err(|e| {
                        BackupError::Write(format!("Failed to serialize snapshot: {}", e))
                    })?;
                    writer.write_all(b"\n").map_err(write_error)?;
                }
                SnapshotFormat::Jsonl => {
                    for record in records {
                        serde_json::to_writer(&mut *writer, record).map_err(|e| {
                            BackupError::Write(format!("Failed to serialize record: {}", e))
                        })?;
                        writer.write_all(b"\n").map_err(write_error)?;
                    }
                }
            }
            Ok(())
        })
    }

    /// Commit a window's records according to the overwrite policy
    ///
    /// With overwrite disabled an existing snapshot is left untouched and
    /// `Skipped` is returned, including when a concurrent run publishes the
    /// same window between the check and the publish.
    pub fn commit(&self, window: &TimeWindow, records: RecordSet) -> Result<CommitOutcome> {
        let path = self.snapshot_path(window);
        if !self.overwrite && path.exists() {
            return Ok(CommitOutcome::Skipped(path));
        }

        let count = records.len();
        let staged = self.stage(window, &records)?;
        drop(records);

        match staged.publish(self.overwrite)? {
            Published::Committed(path) => Ok(CommitOutcome::Written {
                path,
                records: count,
            }),
            Published::AlreadyExists(path) => Ok(CommitOutcome::Skipped(path)),
        }
    }
}

fn write_error(err: std::io::Error) -> BackupError {
    BackupError::Write(format!("Failed to write snapshot: {}", err))
}
