//! Time windows and ranges
//!
//! A `TimeWindow` is the unit of backup work: one half-open interval that maps
//! to exactly one snapshot file. Windows are only created by the partitioner
//! (or validated through `TimeWindow::new`), so `start < end` always holds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BackupError, Result};

/// Timestamp format used in snapshot filenames
const FILENAME_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// The earliest instant a nanosecond-precision InfluxDB timestamp can hold
pub fn earliest() -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(i64::MIN)
}

/// A requested backup range, `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a range, rejecting one that ends before it starts
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(BackupError::config(format!(
                "range start {} is after range end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Check if the range covers no time at all
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A half-open interval `[start, end)` backed up into one snapshot file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting empty or inverted intervals
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(BackupError::config(format!(
                "window start {} must be before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    pub(crate) fn from_bounds(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start < end);
        Self { start, end }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Check if an instant falls within this window
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Deterministic file stem derived only from the window bounds
    ///
    /// Re-running the same request maps every window to the same stem, which
    /// is what makes skip-if-exists and overwrite well-defined.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}",
            self.start.format(FILENAME_TIME_FORMAT),
            self.end.format(FILENAME_TIME_FORMAT)
        )
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%d %H:%M:%S"),
            self.end.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_window_rejects_empty_interval() {
        let t = at(2024, 1, 1, 0);
        assert!(TimeWindow::new(t, t).is_err());
        assert!(TimeWindow::new(at(2024, 1, 2, 0), t).is_err());
    }

    #[test]
    fn test_window_is_half_open() {
        let window = TimeWindow::new(at(2024, 1, 1, 0), at(2024, 1, 2, 0)).unwrap();
        assert!(window.contains(at(2024, 1, 1, 0)));
        assert!(window.contains(at(2024, 1, 1, 23)));
        assert!(!window.contains(at(2024, 1, 2, 0)));
    }

    #[test]
    fn test_file_stem_is_deterministic() {
        let window = TimeWindow::new(at(2024, 1, 1, 0), at(2024, 1, 2, 0)).unwrap();
        assert_eq!(window.file_stem(), "20240101T000000Z_20240102T000000Z");

        let same = TimeWindow::new(at(2024, 1, 1, 0), at(2024, 1, 2, 0)).unwrap();
        assert_eq!(window.file_stem(), same.file_stem());
    }

    #[test]
    fn test_range_allows_empty_but_not_inverted() {
        let t = at(2024, 1, 1, 0);
        assert!(TimeRange::new(t, t).unwrap().is_empty());
        assert!(TimeRange::new(at(2024, 1, 2, 0), t).is_err());
    }

    #[test]
    fn test_earliest_precedes_epoch() {
        assert!(earliest() < DateTime::UNIX_EPOCH);
        assert_eq!(earliest().timestamp_nanos_opt(), Some(i64::MIN));
    }
}
