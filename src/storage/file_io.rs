//! File I/O utilities with atomic writes
//!
//! Provides safe file operations that won't corrupt data on failure. Content
//! is first written to a hidden temporary file in the destination directory,
//! synced, and only then published under its final name. A reader of the
//! directory never observes a partially written file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{BackupError, Result};

/// Result of publishing a staged file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    /// The file now exists under its final name
    Committed(PathBuf),
    /// Another writer committed the final name first; nothing was replaced
    AlreadyExists(PathBuf),
}

/// A fully written, synced temporary file awaiting publication
///
/// Dropping a `StagedFile` without publishing removes the temporary file.
#[derive(Debug)]
pub struct StagedFile {
    temp_path: PathBuf,
    final_path: PathBuf,
    published: bool,
}

impl StagedFile {
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Publish the staged file under its final name
    ///
    /// With `replace`, an existing file is atomically superseded by rename.
    /// Without it, the publish is no-clobber: if the final name appeared since
    /// staging (e.g. an overlapping run), the existing file is kept.
    pub fn publish(mut self, replace: bool) -> Result<Published> {
        let outcome = if replace {
            fs::rename(&self.temp_path, &self.final_path).map_err(|e| {
                BackupError::Write(format!(
                    "Failed to rename {} to {}: {}",
                    self.temp_path.display(),
                    self.final_path.display(),
                    e
                ))
            })?;
            Published::Committed(self.final_path.clone())
        } else {
            self.publish_no_clobber()?
        };

        self.published = true;
        Ok(outcome)
    }

    fn publish_no_clobber(&self) -> Result<Published> {
        match fs::hard_link(&self.temp_path, &self.final_path) {
            Ok(()) => {
                let _ = fs::remove_file(&self.temp_path);
                Ok(Published::Committed(self.final_path.clone()))
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let _ = fs::remove_file(&self.temp_path);
                Ok(Published::AlreadyExists(self.final_path.clone()))
            }
            // Filesystems without hard links fall back to a checked rename
            Err(_) if !self.final_path.exists() => {
                fs::rename(&self.temp_path, &self.final_path).map_err(|e| {
                    BackupError::Write(format!(
                        "Failed to rename {} to {}: {}",
                        self.temp_path.display(),
                        self.final_path.display(),
                        e
                    ))
                })?;
                Ok(Published::Committed(self.final_path.clone()))
            }
            Err(_) => {
                let _ = fs::remove_file(&self.temp_path);
                Ok(Published::AlreadyExists(self.final_path.clone()))
            }
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.published {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

/// Temporary name for `final_path`, unique per writer
///
/// Hidden (dot-prefixed) and in the same directory, which is required for the
/// rename to be atomic.
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    final_path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

/// Write content to a temporary file next to `final_path` and sync it
///
/// `write` receives a buffered writer over the temporary file. Nothing is
/// visible under `final_path` until the returned stage is published.
pub fn stage_file<F>(final_path: &Path, write: F) -> Result<StagedFile>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let temp_path = temp_path_for(final_path);

    let file = File::create(&temp_path)
        .map_err(|e| BackupError::Write(format!("Failed to create temp file: {}", e)))?;

    // From here on, Drop cleans the temp file up on any error
    let staged = StagedFile {
        temp_path,
        final_path: final_path.to_path_buf(),
        published: false,
    };

    let mut writer = BufWriter::new(file);
    write(&mut writer)?;

    writer
        .flush()
        .map_err(|e| BackupError::Write(format!("Failed to flush data: {}", e)))?;

    // Sync to disk before rename
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| BackupError::Write(format!("Failed to sync data: {}", e)))?;

    Ok(staged)
}

/// Ensure `dir` exists and is a directory
///
/// Fails with `InvalidConfiguration` if `dir`, or the nearest existing
/// ancestor of a missing `dir`, is not a directory.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if let Some(existing) = dir.ancestors().find(|p| p.exists()) {
        if !existing.is_dir() {
            return Err(BackupError::config(format!(
                "target {} is not a directory ({} is a file)",
                dir.display(),
                existing.display()
            )));
        }
    }

    fs::create_dir_all(dir).map_err(|e| {
        BackupError::Write(format!(
            "Failed to create directory {}: {}",
            dir.display(),
            e
        ))
    })
}

/// Check if `path` holds one well-formed JSON document
#[cfg(test)]
pub(crate) fn is_json_document(path: impl AsRef<Path>) -> bool {
    fs::read(path.as_ref())
        .ok()
        .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok())
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_text(text: &'static str) -> impl FnOnce(&mut BufWriter<File>) -> Result<()> {
        move |w| {
            w.write_all(text.as_bytes())?;
            Ok(())
        }
    }

    fn temp_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn test_stage_and_publish() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");

        let staged = stage_file(&path, write_text(r#"{"ok": true}"#)).unwrap();
        assert!(staged.temp_path().exists());
        assert!(!path.exists());

        let outcome = staged.publish(false).unwrap();
        assert_eq!(outcome, Published::Committed(path.clone()));
        assert!(is_json_document(&path));
        assert!(temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_unpublished_stage_is_cleaned_up() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");

        let staged = stage_file(&path, write_text("{}")).unwrap();
        drop(staged);

        assert!(!path.exists());
        assert!(temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_crash_before_publish_leaves_no_final_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");

        let staged = stage_file(&path, write_text(r#"{"partial": "#)).unwrap();
        // Simulate the process dying between write and rename
        std::mem::forget(staged);

        assert!(!path.exists());
        assert_eq!(temp_files(temp_dir.path()).len(), 1);
    }

    #[test]
    fn test_failed_write_removes_temp() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");

        let err = stage_file(&path, |_| Err(BackupError::Json("boom".into()))).unwrap_err();
        assert!(matches!(err, BackupError::Json(_)));
        assert!(temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_no_clobber_publish_keeps_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        fs::write(&path, "first").unwrap();

        let staged = stage_file(&path, write_text("second")).unwrap();
        let outcome = staged.publish(false).unwrap();

        assert_eq!(outcome, Published::AlreadyExists(path.clone()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");
        assert!(temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_replace_publish_supersedes_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        fs::write(&path, "first").unwrap();

        let staged = stage_file(&path, write_text("second")).unwrap();
        staged.publish(true).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_ensure_dir() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());

        let file = temp_dir.path().join("file");
        fs::write(&file, "x").unwrap();
        let err = ensure_dir(&file).unwrap_err();
        assert!(matches!(err, BackupError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_ensure_dir_below_a_file_is_invalid_configuration() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file");
        fs::write(&file, "x").unwrap();

        let err = ensure_dir(&file.join("srv").join("db").join("1d")).unwrap_err();
        assert!(matches!(err, BackupError::InvalidConfiguration(_)));
        assert!(file.is_file());
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let path = Path::new("/backups/db/1d/a_b.json");
        let temp = temp_path_for(path);
        assert_eq!(temp.parent(), path.parent());
        let name = temp.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".a_b.json."));
        assert!(name.ends_with(".tmp"));
    }
}
