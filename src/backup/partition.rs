//! Interval partitioner
//!
//! Turns a backup range and a mode into an ordered, gap-free sequence of
//! non-overlapping windows. A `Partition` holds no iteration state: each call
//! to `iter()` starts a fresh pass over the same windows.

use chrono::{DateTime, Utc};

use crate::error::{BackupError, Result};
use crate::models::{earliest, BackupMode, TimeRange, TimeWindow, WindowWidth};

/// A resolved partition of one backup range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    range: TimeRange,
    width: Option<WindowWidth>,
}

impl Partition {
    pub fn range(&self) -> TimeRange {
        self.range
    }

    /// Width of each window, `None` for a full backup
    pub fn width(&self) -> Option<WindowWidth> {
        self.width
    }

    /// A fresh iterator over the windows, in chronological order
    pub fn iter(&self) -> Windows {
        Windows {
            cursor: self.range.start(),
            end: self.range.end(),
            width: self.width,
        }
    }

    /// Number of windows in the partition
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

impl IntoIterator for &Partition {
    type Item = TimeWindow;
    type IntoIter = Windows;

    fn into_iter(self) -> Windows {
        self.iter()
    }
}

/// Iterator over the windows of a `Partition`
#[derive(Debug, Clone)]
pub struct Windows {
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    width: Option<WindowWidth>,
}

impl Iterator for Windows {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        if self.cursor >= self.end {
            return None;
        }

        let next = match self.width {
            None => self.end,
            // Overflow past the representable range truncates to the end
            Some(width) => width
                .advance(self.cursor)
                .map_or(self.end, |t| t.min(self.end)),
        };

        let window = TimeWindow::from_bounds(self.cursor, next);
        self.cursor = next;
        Some(window)
    }
}

impl std::iter::FusedIterator for Windows {}

/// Partition a backup range according to the mode
///
/// Full mode yields one window equal to `range`, or `[earliest, now)` when no
/// range is given. Incremental mode yields consecutive `width`-sized windows
/// from `range.start`, the last truncated to `range.end`. `now` must be the
/// single snapshot captured for the run.
pub fn partition(
    range: Option<TimeRange>,
    mode: &BackupMode,
    now: DateTime<Utc>,
) -> Result<Partition> {
    match mode {
        BackupMode::Full => {
            let range = match range {
                Some(range) => range,
                None => TimeRange::new(earliest(), now)?,
            };
            Ok(Partition { range, width: None })
        }
        BackupMode::Incremental(width) => {
            let range = range.ok_or_else(|| {
                BackupError::config("incremental backup requires an explicit range")
            })?;

            let advances = width
                .advance(range.start())
                .is_some_and(|next| next > range.start());
            if !advances && !range.is_empty() {
                return Err(BackupError::config(format!(
                    "window width {} must be a positive duration",
                    width
                )));
            }

            Ok(Partition {
                range,
                width: Some(*width),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn range(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<TimeRange> {
        Some(TimeRange::new(start, end).unwrap())
    }

    fn incremental(width: &str) -> BackupMode {
        BackupMode::Incremental(width.parse().unwrap())
    }

    /// Windows are contiguous, ordered, non-overlapping, and cover the range
    fn assert_exact_cover(windows: &[TimeWindow], start: DateTime<Utc>, end: DateTime<Utc>) {
        assert_eq!(windows.first().unwrap().start(), start);
        assert_eq!(windows.last().unwrap().end(), end);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
            assert!(pair[0].start() < pair[1].start());
        }
    }

    #[test]
    fn test_daily_partition() {
        let start = at(2024, 1, 1, 0);
        let end = at(2024, 1, 4, 0);
        let p = partition(range(start, end), &incremental("1d"), end).unwrap();
        let windows: Vec<_> = p.iter().collect();

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], TimeWindow::new(at(2024, 1, 1, 0), at(2024, 1, 2, 0)).unwrap());
        assert_eq!(windows[1], TimeWindow::new(at(2024, 1, 2, 0), at(2024, 1, 3, 0)).unwrap());
        assert_eq!(windows[2], TimeWindow::new(at(2024, 1, 3, 0), at(2024, 1, 4, 0)).unwrap());
    }

    #[test]
    fn test_final_window_is_truncated() {
        let start = at(2024, 1, 1, 0);
        let end = at(2024, 1, 1, 20);
        let p = partition(range(start, end), &incremental("8h"), end).unwrap();
        let windows: Vec<_> = p.iter().collect();

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2].start(), at(2024, 1, 1, 16));
        assert_eq!(windows[2].end(), end);
        assert_exact_cover(&windows, start, end);
    }

    #[test]
    fn test_exact_cover_for_many_widths() {
        let start = Utc.with_ymd_and_hms(2023, 11, 3, 7, 13, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 29, 18, 41, 0).unwrap();

        for width in ["1m", "45m", "1h", "7h", "1d", "3d", "1M", "5M"] {
            let p = partition(range(start, end), &incremental(width), end).unwrap();
            let windows: Vec<_> = p.iter().collect();
            assert_exact_cover(&windows, start, end);
            assert_eq!(p.len(), windows.len(), "width {}", width);
        }
    }

    #[test]
    fn test_empty_range_yields_no_windows() {
        let t = at(2024, 1, 1, 0);
        let p = partition(range(t, t), &incremental("1d"), t).unwrap();
        assert!(p.is_empty());
        assert_eq!(p.iter().count(), 0);
    }

    #[test]
    fn test_partition_is_restartable() {
        let p = partition(
            range(at(2024, 1, 1, 0), at(2024, 1, 10, 0)),
            &incremental("1d"),
            at(2024, 1, 10, 0),
        )
        .unwrap();

        let first: Vec<_> = p.iter().collect();
        let second: Vec<_> = p.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 9);
    }

    #[test]
    fn test_full_backup_is_single_window() {
        let start = at(2024, 1, 1, 0);
        let end = at(2024, 6, 1, 0);
        let p = partition(range(start, end), &BackupMode::Full, end).unwrap();
        let windows: Vec<_> = p.iter().collect();
        assert_eq!(windows, vec![TimeWindow::new(start, end).unwrap()]);
    }

    #[test]
    fn test_full_backup_without_range_spans_all_time_to_now() {
        let now = at(2024, 6, 1, 12);
        let p = partition(None, &BackupMode::Full, now).unwrap();
        let windows: Vec<_> = p.iter().collect();

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start(), earliest());
        assert_eq!(windows[0].end(), now);
    }

    #[test]
    fn test_incremental_requires_range() {
        let err = partition(None, &incremental("1d"), at(2024, 1, 1, 0)).unwrap_err();
        assert!(matches!(err, BackupError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_same_inputs_same_partition() {
        let r = range(at(2024, 1, 1, 0), at(2024, 3, 1, 0));
        let a: Vec<_> = partition(r, &incremental("6h"), at(2024, 3, 1, 0))
            .unwrap()
            .iter()
            .collect();
        let b: Vec<_> = partition(r, &incremental("6h"), at(2024, 3, 1, 0))
            .unwrap()
            .iter()
            .collect();
        assert_eq!(a, b);
    }
}
