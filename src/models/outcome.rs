//! Per-window outcomes and the aggregated backup result

use std::fmt;
use std::path::PathBuf;

use super::window::TimeWindow;
use crate::error::BackupError;

/// Why a window was not fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A snapshot with the window's deterministic name was already committed
    AlreadyExists,
    /// The run was cancelled before any worker claimed the window
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "already exists"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal status of one window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowStatus {
    /// Snapshot committed (an empty record set is still a valid snapshot)
    Success { path: PathBuf, records: usize },
    Skipped(SkipReason),
    Failed(BackupError),
}

/// Outcome recorded by the scheduler for one window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOutcome {
    pub window: TimeWindow,
    pub status: WindowStatus,
}

impl WindowOutcome {
    pub fn success(window: TimeWindow, path: PathBuf, records: usize) -> Self {
        Self {
            window,
            status: WindowStatus::Success { path, records },
        }
    }

    pub fn skipped(window: TimeWindow, reason: SkipReason) -> Self {
        Self {
            window,
            status: WindowStatus::Skipped(reason),
        }
    }

    pub fn failed(window: TimeWindow, error: BackupError) -> Self {
        Self {
            window,
            status: WindowStatus::Failed(error),
        }
    }

    /// The error attached to a failed outcome
    pub fn error(&self) -> Option<&BackupError> {
        match &self.status {
            WindowStatus::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Overall classification of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    FullySucceeded,
    SucceededWithSkips,
    CompletedWithFailures,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullySucceeded => write!(f, "fully succeeded"),
            Self::SucceededWithSkips => write!(f, "succeeded with skips"),
            Self::CompletedWithFailures => write!(f, "completed with failures"),
        }
    }
}

/// Aggregated result of one backup run
///
/// Outcomes are grouped by status and sorted chronologically, so the result
/// does not depend on the order in which workers finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupResult {
    pub succeeded: Vec<TimeWindow>,
    pub skipped: Vec<(TimeWindow, SkipReason)>,
    pub failed: Vec<(TimeWindow, BackupError)>,
    /// Total records written across all successful windows
    pub records_written: usize,
}

impl BackupResult {
    /// Aggregate a set of outcomes
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = WindowOutcome>) -> Self {
        let mut result = Self::default();

        for outcome in outcomes {
            match outcome.status {
                WindowStatus::Success { records, .. } => {
                    result.records_written += records;
                    result.succeeded.push(outcome.window);
                }
                WindowStatus::Skipped(reason) => result.skipped.push((outcome.window, reason)),
                WindowStatus::Failed(err) => result.failed.push((outcome.window, err)),
            }
        }

        result.succeeded.sort();
        result.skipped.sort_by_key(|(window, _)| *window);
        result.failed.sort_by_key(|(window, _)| *window);
        result
    }

    /// Number of windows with a recorded outcome
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }

    /// A run succeeds overall only when no window failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Windows skipped because of cancellation
    pub fn cancelled(&self) -> usize {
        self.skipped
            .iter()
            .filter(|(_, reason)| *reason == SkipReason::Cancelled)
            .count()
    }

    pub fn status(&self) -> RunStatus {
        if !self.failed.is_empty() {
            RunStatus::CompletedWithFailures
        } else if !self.skipped.is_empty() {
            RunStatus::SucceededWithSkips
        } else {
            RunStatus::FullySucceeded
        }
    }
}
