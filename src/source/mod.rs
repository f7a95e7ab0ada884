//! Data-source collaborators
//!
//! The backup engine only needs one capability from the database: "fetch every
//! record in `[start, end)`", with failures classified as transient or
//! terminal. `InfluxSource` implements it against the InfluxDB 0.8 HTTP API.

pub mod influx;

pub use influx::{list_databases, InfluxSource};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::RecordSet;

/// Range-query interface the backup engine fetches windows through
///
/// Errors must be classified: `BackupError::Transient` for failures worth
/// retrying and `BackupError::Terminal` for failures retrying cannot fix.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch all records with timestamps in `[start, end)`.
    async fn query_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<RecordSet>;

    /// Check the source is reachable before any window is dispatched.
    ///
    /// A failure here aborts the run with `BackupError::Unavailable`.
    async fn probe(&self) -> Result<()> {
        Ok(())
    }
}
