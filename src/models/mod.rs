//! Core data models for influxdb-backup
//!
//! This module contains the data structures the backup engine passes
//! between its stages: time windows and widths, the resolved request,
//! and per-window outcomes.

pub mod outcome;
pub mod request;
pub mod width;
pub mod window;

pub use outcome::{BackupResult, RunStatus, SkipReason, WindowOutcome, WindowStatus};
pub use request::{BackupMode, BackupRequest, SnapshotFormat};
pub use width::{WidthUnit, WindowWidth};
pub use window::{earliest, TimeRange, TimeWindow};

/// Records returned by the data source for one window
///
/// Records are opaque to the engine; for InfluxDB they are series objects
/// (`name`, `columns`, `points`).
pub type RecordSet = Vec<serde_json::Value>;
