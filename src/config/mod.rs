//! Configuration module for influxdb-backup
//!
//! This module provides configuration management including:
//! - Configuration file resolution and `~` expansion
//! - Server connection settings loaded from YAML
//! - Snapshot directory layout

pub mod paths;
pub mod settings;

pub use paths::BackupPaths;
pub use settings::{ServerConfig, Settings};
