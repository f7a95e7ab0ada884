//! Shared fixtures for the backup engine integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use influxdb_backup::backup::fetch::no_jitter;
use influxdb_backup::backup::{RetryPolicy, Sleeper};
use influxdb_backup::models::{
    BackupMode, BackupRequest, RecordSet, SnapshotFormat, TimeRange, WindowWidth,
};
use influxdb_backup::source::DataSource;
use influxdb_backup::{BackupError, Result};

pub fn jan(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

/// Daily incremental request over `[jan(from), jan(to))`
pub fn daily_request(target: &Path, from: u32, to: u32, workers: usize) -> BackupRequest {
    BackupRequest {
        range: Some(TimeRange::new(jan(from), jan(to)).unwrap()),
        mode: BackupMode::Incremental(WindowWidth::days(1).unwrap()),
        target_dir: target.to_path_buf(),
        overwrite: false,
        worker_count: workers,
        format: SnapshotFormat::Json,
        now: jan(28),
    }
}

pub fn fast_retries(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        jitter: no_jitter,
    }
}

/// In-memory data source with call accounting and scripted failures
#[derive(Default)]
pub struct MemorySource {
    /// Window starts that return no records
    pub empty: HashSet<DateTime<Utc>>,
    /// Window starts that fail with a terminal error
    pub failing: Mutex<HashSet<DateTime<Utc>>>,
    /// Number of initial calls that fail with a transient error
    pub transient_failures: AtomicUsize,
    /// Simulated query latency
    pub delay: Option<Duration>,
    /// Cancelled when the query for this start begins
    pub cancel_on: Option<(DateTime<Utc>, CancellationToken)>,
    pub unreachable: bool,

    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub queried: Mutex<Vec<DateTime<Utc>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_empty(mut self, start: DateTime<Utc>) -> Self {
        self.empty.insert(start);
        self
    }

    pub fn with_failing(self, start: DateTime<Utc>) -> Self {
        self.failing.lock().unwrap().insert(start);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn queried(&self) -> Vec<DateTime<Utc>> {
        let mut starts = self.queried.lock().unwrap().clone();
        starts.sort();
        starts
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn query_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<RecordSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queried.lock().unwrap().push(start);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some((at, token)) = &self.cancel_on {
            if *at == start {
                token.cancel();
            }
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(BackupError::Transient("connection reset".into()));
        }

        if self.failing.lock().unwrap().contains(&start) {
            return Err(BackupError::Terminal("HTTP 400: bad query".into()));
        }

        if self.empty.contains(&start) {
            return Ok(Vec::new());
        }

        Ok(vec![json!({
            "name": "cpu",
            "columns": ["time", "value"],
            "points": [[start.timestamp(), 1.0], [end.timestamp() - 1, 2.0]],
        })])
    }

    async fn probe(&self) -> Result<()> {
        if self.unreachable {
            return Err(BackupError::Transient("connection refused".into()));
        }
        Ok(())
    }
}

/// Sleeper that returns immediately and records requested delays
#[derive(Default)]
pub struct NoopSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn shared(source: MemorySource) -> Arc<MemorySource> {
    Arc::new(source)
}
