//! CLI command handlers
//!
//! This module contains the command handlers for the influxdb-backup CLI.

pub mod backup;
pub mod databases;

pub use backup::{handle_backup_command, BackupArgs, BackupTotals};
pub use databases::{handle_databases_command, DatabasesArgs};
