//! Storage layer for influxdb-backup
//!
//! Provides atomic file staging and publication with automatic directory
//! creation. The snapshot writer builds on these primitives.

pub mod file_io;

pub use file_io::{ensure_dir, stage_file, Published, StagedFile};
