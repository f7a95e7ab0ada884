//! Backup mode selector
//!
//! Validates the user's options and resolves them into a `BackupRequest`,
//! applying defaults. This is also where the run's single wall-clock snapshot
//! is taken; nothing downstream reads the clock again.

use std::path::PathBuf;

use chrono::{DateTime, SubsecRound, Utc};

use crate::error::{BackupError, Result};
use crate::models::{earliest, BackupMode, BackupRequest, SnapshotFormat, TimeRange, WindowWidth};

/// Default incremental window width
pub const DEFAULT_INTERVAL: &str = "1d";

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 10;

/// Default number of windows an incremental backup looks back
pub const DEFAULT_WINDOWS: u32 = 1;

/// Unvalidated backup options, as parsed from the command line
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    /// Select a full backup
    pub full: bool,
    /// Select an incremental backup
    pub incremental: bool,
    /// Incremental window width, e.g. `8h` (defaults to `1d`)
    pub interval: Option<String>,
    /// Start of the range; defaults depend on the mode
    pub since: Option<DateTime<Utc>>,
    /// End of the range; defaults depend on the mode
    pub until: Option<DateTime<Utc>>,
    /// Number of windows to look back from `until` (incremental only)
    pub windows: Option<u32>,
    pub target_dir: Option<PathBuf>,
    pub overwrite: bool,
    pub workers: Option<usize>,
    pub format: SnapshotFormat,
}

/// Resolve options into a validated request, using the current time
pub fn resolve_now(options: BackupOptions) -> Result<BackupRequest> {
    resolve(options, Utc::now())
}

/// Resolve options into a validated request
///
/// `now` is truncated to whole seconds and stored in the request.
///
/// Incremental ranges default to the last `windows` whole windows: `until`
/// is `now` aligned down to the interval's unit, and `since` is `windows`
/// widths before it. Full backups without explicit bounds leave the range
/// unset, so the partitioner spans all time up to `now`.
pub fn resolve(options: BackupOptions, now: DateTime<Utc>) -> Result<BackupRequest> {
    let now = now.trunc_subsecs(0);

    let mode = match (options.full, options.incremental) {
        (true, true) => {
            return Err(BackupError::config(
                "--full and --incremental are mutually exclusive",
            ))
        }
        (false, false) => {
            return Err(BackupError::config(
                "choose a backup mode: --full or --incremental",
            ))
        }
        (true, false) => {
            if options.interval.is_some() || options.windows.is_some() {
                return Err(BackupError::config(
                    "an interval and window count only apply to incremental backups",
                ));
            }
            BackupMode::Full
        }
        (false, true) => {
            let width: WindowWidth = options
                .interval
                .as_deref()
                .unwrap_or(DEFAULT_INTERVAL)
                .parse()?;
            BackupMode::Incremental(width)
        }
    };

    let worker_count = options.workers.unwrap_or(DEFAULT_WORKERS);
    if worker_count < 1 {
        return Err(BackupError::config("worker count must be at least 1"));
    }

    let since = options.since.map(|t| t.trunc_subsecs(0));
    let until = options.until.map(|t| t.trunc_subsecs(0));

    let range = match mode {
        BackupMode::Full => match (since, until) {
            (None, None) => None,
            (since, until) => Some(TimeRange::new(
                since.unwrap_or_else(earliest),
                until.unwrap_or(now),
            )?),
        },
        BackupMode::Incremental(width) => {
            let windows = options.windows.unwrap_or(DEFAULT_WINDOWS);
            if windows == 0 {
                return Err(BackupError::config("window count must be at least 1"));
            }

            let until = until.unwrap_or_else(|| width.align_down(now));
            let since = match since {
                Some(since) => since,
                None => width.retreat(until, windows).ok_or_else(|| {
                    BackupError::config(format!(
                        "looking back {} x {} from {} leaves the representable time range",
                        windows,
                        width,
                        until.to_rfc3339()
                    ))
                })?,
            };
            Some(TimeRange::new(since, until)?)
        }
    };

    Ok(BackupRequest {
        range,
        mode,
        target_dir: options.target_dir.unwrap_or_else(|| PathBuf::from(".")),
        overwrite: options.overwrite,
        worker_count,
        format: options.format,
        now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 17, 13, 45, 12).unwrap()
    }

    fn incremental() -> BackupOptions {
        BackupOptions {
            incremental: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_exactly_one_mode_is_required() {
        let neither = resolve(BackupOptions::default(), now()).unwrap_err();
        assert!(matches!(neither, BackupError::InvalidConfiguration(_)));

        let both = BackupOptions {
            full: true,
            incremental: true,
            ..Default::default()
        };
        assert!(matches!(
            resolve(both, now()).unwrap_err(),
            BackupError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn test_incremental_defaults() {
        let request = resolve(incremental(), now()).unwrap();

        assert_eq!(request.mode, BackupMode::Incremental(WindowWidth::days(1).unwrap()));
        assert_eq!(request.worker_count, DEFAULT_WORKERS);
        assert_eq!(request.target_dir, PathBuf::from("."));
        assert!(!request.overwrite);

        let range = request.range.unwrap();
        assert_eq!(range.start(), Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap());
        assert_eq!(range.end(), Utc.with_ymd_and_hms(2024, 3, 17, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_incremental_lookback_windows() {
        let options = BackupOptions {
            interval: Some("8h".into()),
            windows: Some(3),
            ..incremental()
        };
        let range = resolve(options, now()).unwrap().range.unwrap();
        assert_eq!(range.start(), Utc.with_ymd_and_hms(2024, 3, 16, 13, 0, 0).unwrap());
        assert_eq!(range.end(), Utc.with_ymd_and_hms(2024, 3, 17, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_explicit_range_wins() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap();
        let options = BackupOptions {
            since: Some(since),
            until: Some(until),
            ..incremental()
        };
        let range = resolve(options, now()).unwrap().range.unwrap();
        assert_eq!((range.start(), range.end()), (since, until));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let options = BackupOptions {
            since: Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
            until: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..incremental()
        };
        assert!(resolve(options, now()).is_err());
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let options = BackupOptions {
            workers: Some(0),
            ..incremental()
        };
        let err = resolve(options, now()).unwrap_err();
        assert_eq!(err, BackupError::config("worker count must be at least 1"));
    }

    #[test]
    fn test_invalid_interval_is_rejected() {
        let options = BackupOptions {
            interval: Some("5y".into()),
            ..incremental()
        };
        assert!(matches!(
            resolve(options, now()).unwrap_err(),
            BackupError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn test_full_backup_leaves_range_open_and_snapshots_now() {
        let options = BackupOptions {
            full: true,
            ..Default::default()
        };
        let request = resolve(options, now()).unwrap();
        assert_eq!(request.mode, BackupMode::Full);
        assert!(request.range.is_none());
        assert_eq!(request.now, now());
    }

    #[test]
    fn test_full_backup_with_since_ends_at_now() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let options = BackupOptions {
            full: true,
            since: Some(since),
            ..Default::default()
        };
        let range = resolve(options, now()).unwrap().range.unwrap();
        assert_eq!((range.start(), range.end()), (since, now()));
    }

    #[test]
    fn test_full_backup_rejects_interval() {
        let options = BackupOptions {
            full: true,
            interval: Some("1d".into()),
            ..Default::default()
        };
        assert!(resolve(options, now()).is_err());
    }

    #[test]
    fn test_now_is_truncated_to_seconds() {
        let precise = now() + chrono::TimeDelta::milliseconds(750);
        let request = resolve(
            BackupOptions {
                full: true,
                ..Default::default()
            },
            precise,
        )
        .unwrap();
        assert_eq!(request.now, now());
    }
}
