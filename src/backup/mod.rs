//! Backup engine for influxdb-backup
//!
//! Exports a time-series database into per-window JSON snapshot files.
//!
//! # Architecture
//!
//! The engine is built from five stages, leaves first:
//!
//! - `partition`: splits a range into ordered, non-overlapping windows
//! - `writer`: commits one window's records atomically under a
//!   deterministic filename
//! - `fetch`: fetches one window from the data source with bounded retries
//! - `scheduler`: dispatches windows to a fixed worker pool and aggregates
//!   the per-window outcomes
//! - `mode`: resolves user options into a validated request
//!
//! # Resume Semantics
//!
//! There is no manifest or lock file. A snapshot with the window's name *is*
//! the completion marker, so re-running a request after a partial failure
//! skips committed windows (or replaces them with `overwrite`) and retries
//! the rest.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use influxdb_backup::backup::{resolve_now, BackupOptions, Scheduler};
//!
//! let request = resolve_now(BackupOptions {
//!     incremental: true,
//!     interval: Some("1d".into()),
//!     windows: Some(7),
//!     ..Default::default()
//! })?;
//!
//! let scheduler = Scheduler::new(Arc::new(source));
//! let result = scheduler.run(&request).await?;
//! println!("{}", result.status());
//! ```

pub mod fetch;
pub mod mode;
pub mod partition;
pub mod scheduler;
pub mod writer;

pub use fetch::{FetchTask, RetryPolicy, Sleeper, TokioSleeper};
pub use mode::{resolve, resolve_now, BackupOptions};
pub use partition::{partition, Partition, Windows};
pub use scheduler::Scheduler;
pub use writer::{CommitOutcome, SnapshotDocument, SnapshotWriter};
