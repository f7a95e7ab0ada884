//! Worker pool scheduler
//!
//! Orchestrates one backup run: partitions the request, fans the windows out
//! to a fixed pool of workers, and aggregates one outcome per window.
//!
//! The window sequence is materialized once into an immutable arena shared by
//! all workers. A single atomic cursor is the only claim primitive: each
//! `fetch_add` hands out a distinct index, so no window is ever processed
//! twice and no lock guards the queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::fetch::{FetchTask, RetryPolicy, SharedSleeper, TokioSleeper};
use super::partition::partition;
use super::writer::{CommitOutcome, SnapshotWriter};
use crate::error::{BackupError, Result};
use crate::models::{BackupRequest, BackupResult, SkipReason, TimeWindow, WindowOutcome};
use crate::source::DataSource;

/// Runs backup requests against one data source
pub struct Scheduler {
    source: Arc<dyn DataSource>,
    retry: RetryPolicy,
    sleeper: SharedSleeper,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Create a scheduler with the default retry policy and tokio timers
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            retry: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: SharedSleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Use an externally owned cancellation token (e.g. wired to Ctrl-C)
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run a backup request to completion
    ///
    /// Returns `Err` only for pre-flight failures (invalid configuration, an
    /// unusable target directory, an unreachable data source). Once windows
    /// are dispatched, every failure is recorded against its window and the
    /// run continues; already committed snapshots are never rolled back.
    pub async fn run(&self, request: &BackupRequest) -> Result<BackupResult> {
        if request.worker_count == 0 {
            return Err(BackupError::config("worker count must be at least 1"));
        }

        let partition = partition(request.range, &request.mode, request.now)?;
        let writer = Arc::new(SnapshotWriter::from_request(request));
        writer.prepare()?;

        let windows: Arc<[TimeWindow]> = partition.iter().collect();
        if windows.is_empty() {
            info!(target_dir = %writer.target_dir().display(), "Empty range, nothing to back up");
            return Ok(BackupResult::default());
        }

        self.source.probe().await.map_err(|err| match err {
            BackupError::Unavailable(_) => err,
            other => BackupError::Unavailable(other.to_string()),
        })?;

        let worker_count = request.worker_count.min(windows.len());
        info!(
            windows = windows.len(),
            workers = worker_count,
            mode = %request.mode.label(),
            overwrite = request.overwrite,
            target_dir = %writer.target_dir().display(),
            "Starting backup run"
        );

        let pool = Arc::new(WorkerPool {
            source: Arc::clone(&self.source),
            writer,
            retry: self.retry,
            sleeper: Arc::clone(&self.sleeper),
            cancel: self.cancel.clone(),
            windows: Arc::clone(&windows),
            cursor: AtomicUsize::new(0),
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let pool = Arc::clone(&pool);
            let tx = tx.clone();
            workers.spawn(async move { pool.work(worker_id, tx).await });
        }
        drop(tx);

        // Outcomes are slotted by window index as workers report them
        let mut slots: Vec<Option<WindowOutcome>> = vec![None; windows.len()];
        let mut completed = 0;
        while let Some((index, outcome)) = rx.recv().await {
            completed += 1;
            debug!(completed, total = windows.len(), window = %outcome.window, "Window finished");
            slots[index] = Some(outcome);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "Backup worker aborted");
            }
        }

        let claimed = pool.claimed();
        let outcomes = slots.into_iter().enumerate().map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                let window = windows[index];
                if index < claimed {
                    WindowOutcome::failed(
                        window,
                        BackupError::WorkerAborted("worker exited before recording an outcome".into()),
                    )
                } else {
                    WindowOutcome::skipped(window, SkipReason::Cancelled)
                }
            })
        });

        let result = BackupResult::from_outcomes(outcomes);
        info!(
            succeeded = result.succeeded.len(),
            skipped = result.skipped.len(),
            failed = result.failed.len(),
            records = result.records_written,
            status = %result.status(),
            "Backup run finished"
        );
        Ok(result)
    }
}

/// State shared by the workers of one run
struct WorkerPool {
    source: Arc<dyn DataSource>,
    writer: Arc<SnapshotWriter>,
    retry: RetryPolicy,
    sleeper: SharedSleeper,
    cancel: CancellationToken,
    windows: Arc<[TimeWindow]>,
    cursor: AtomicUsize,
}

impl WorkerPool {
    /// Number of windows handed out to workers so far
    fn claimed(&self) -> usize {
        self.cursor.load(Ordering::SeqCst).min(self.windows.len())
    }

    /// Claim the next unclaimed window, if any remain
    fn claim(&self) -> Option<(usize, TimeWindow)> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.windows.get(index).map(|window| (index, *window))
    }

    async fn work(
        self: Arc<Self>,
        worker_id: usize,
        tx: mpsc::UnboundedSender<(usize, WindowOutcome)>,
    ) {
        loop {
            if self.cancel.is_cancelled() {
                debug!(worker_id, "Cancellation requested, worker stopping");
                break;
            }

            let Some((index, window)) = self.claim() else {
                break;
            };

            let outcome = self.process(window).await;
            if tx.send((index, outcome)).is_err() {
                break;
            }
        }
    }

    async fn process(&self, window: TimeWindow) -> WindowOutcome {
        // Existence pre-check saves the fetch entirely
        if !self.writer.overwrite() && self.writer.exists(&window) {
            debug!(%window, "Snapshot exists, skipping");
            return WindowOutcome::skipped(window, SkipReason::AlreadyExists);
        }

        let task = FetchTask::new(self.source.as_ref(), &self.retry, self.sleeper.as_ref());
        let records = match task.fetch(window).await {
            Ok(records) => records,
            Err(err) => {
                error!(%window, error = %err, "Fetch failed");
                return WindowOutcome::failed(window, err);
            }
        };

        let writer = Arc::clone(&self.writer);
        let committed = tokio::task::spawn_blocking(move || writer.commit(&window, records)).await;

        match committed {
            Ok(Ok(CommitOutcome::Written { path, records })) => {
                info!(%window, records, path = %path.display(), "Snapshot committed");
                WindowOutcome::success(window, path, records)
            }
            Ok(Ok(CommitOutcome::Skipped(path))) => {
                debug!(%window, path = %path.display(), "Snapshot committed concurrently, skipping");
                WindowOutcome::skipped(window, SkipReason::AlreadyExists)
            }
            Ok(Err(err)) => {
                error!(%window, error = %err, "Snapshot write failed");
                WindowOutcome::failed(window, err)
            }
            Err(err) => {
                error!(%window, error = %err, "Snapshot writer task aborted");
                WindowOutcome::failed(window, BackupError::WorkerAborted(err.to_string()))
            }
        }
    }
}
