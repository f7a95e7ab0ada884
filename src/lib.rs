//! influxdb-backup - incremental InfluxDB backups to JSON snapshot files
//!
//! The library is organized into these modules:
//!
//! - `models`: time windows, widths, requests and outcomes
//! - `backup`: partitioner, fetch task, snapshot writer, scheduler and mode selector
//! - `source`: the `DataSource` trait and the InfluxDB HTTP implementation
//! - `storage`: atomic file publication
//! - `config`: YAML server settings and path resolution
//! - `display`: terminal output formatting
//! - `cli`: command handlers
//! - `error`: custom error types

pub mod backup;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod models;
pub mod source;
pub mod storage;

pub use error::{BackupError, Result};
