//! Path management for influxdb-backup
//!
//! Resolves the configuration file location and lays out snapshot
//! directories under the backup target.
//!
//! ## Configuration Resolution Order
//!
//! 1. `-c/--config` on the command line
//! 2. `INFLUXDB_BACKUP_CONFIG` environment variable (if set)
//! 3. `~/.influxdb_backup.yaml`
//!
//! ## Target Layout
//!
//! Snapshots land in `<target>/<server>/<database>/<label>/`, where the label
//! is `full` or the incremental interval (e.g. `1d`).

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::{BackupError, Result};

/// Environment variable overriding the default configuration path
pub const CONFIG_ENV_VAR: &str = "INFLUXDB_BACKUP_CONFIG";

/// Default configuration file name in the home directory
pub const DEFAULT_CONFIG_FILE: &str = ".influxdb_backup.yaml";

/// Manages all paths used by influxdb-backup
#[derive(Debug, Clone)]
pub struct BackupPaths {
    /// Root directory all snapshots are written under
    target_root: PathBuf,
}

impl BackupPaths {
    /// Create paths rooted at the given target directory
    pub fn new(target_root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            target_root: expand_tilde(target_root.as_ref())?,
        })
    }

    /// Get the root target directory
    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    /// Directory for one server's snapshots
    pub fn server_dir(&self, server: &str) -> PathBuf {
        self.target_root.join(sanitize_component(server))
    }

    /// Directory for one database and backup mode
    pub fn snapshot_dir(&self, server: &str, database: &str, label: &str) -> PathBuf {
        self.server_dir(server)
            .join(sanitize_component(database))
            .join(sanitize_component(label))
    }
}

/// Resolve the configuration file path
///
/// An explicit path wins, then `INFLUXDB_BACKUP_CONFIG`, then
/// `~/.influxdb_backup.yaml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return expand_tilde(path);
    }

    if let Ok(custom) = std::env::var(CONFIG_ENV_VAR) {
        return expand_tilde(Path::new(&custom));
    }

    Ok(home_dir()?.join(DEFAULT_CONFIG_FILE))
}

/// Expand a leading `~` to the user's home directory
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(home_dir()?.join(rest)),
        Err(_) => Ok(path.to_path_buf()),
    }
}

fn home_dir() -> Result<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or_else(|| BackupError::config("Could not determine home directory"))
}

/// Make a server or database name safe to use as one path component
fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => format!("_{}", cleaned),
        _ => cleaned,
    }
}
