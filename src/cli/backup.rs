//! Backup CLI command
//!
//! Runs the backup engine for every configured server and every database
//! matching the server's `db_regex`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backup::mode::{DEFAULT_INTERVAL, DEFAULT_WORKERS};
use crate::backup::{resolve_now, BackupOptions, RetryPolicy, Scheduler};
use crate::config::paths::resolve_config_path;
use crate::config::{BackupPaths, Settings};
use crate::display::format_run_summary;
use crate::error::{BackupError, Result};
use crate::models::{BackupResult, SnapshotFormat};
use crate::source::influx::build_client;
use crate::source::{list_databases, InfluxSource};

/// Arguments for `influxdb-backup backup`
#[derive(Args, Debug, Clone)]
pub struct BackupArgs {
    /// Configuration file [default: ~/.influxdb_backup.yaml]
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Incremental backup in windows of INTERVAL (e.g. 8h, 1d, 6m, 1M)
    #[arg(
        short,
        long,
        value_name = "INTERVAL",
        num_args = 0..=1,
        default_missing_value = DEFAULT_INTERVAL,
        conflicts_with = "full"
    )]
    pub incremental: Option<String>,

    /// Full backup of all data as a single snapshot
    #[arg(short, long)]
    pub full: bool,

    /// Re-fetch and replace existing snapshot files
    #[arg(short, long)]
    pub overwrite: bool,

    /// Target directory to back up to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub target: PathBuf,

    /// Number of concurrent download workers
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Number of windows to look back (incremental only) [default: 1]
    #[arg(short = 'n', long, value_name = "N")]
    pub windows: Option<u32>,

    /// Start of the range (RFC 3339 or YYYY-MM-DD, UTC)
    #[arg(long, value_parser = parse_timestamp)]
    pub since: Option<DateTime<Utc>>,

    /// End of the range, exclusive (RFC 3339 or YYYY-MM-DD, UTC)
    #[arg(long, value_parser = parse_timestamp)]
    pub until: Option<DateTime<Utc>>,

    /// Snapshot format (json, jsonl)
    #[arg(long, default_value = "json")]
    pub format: SnapshotFormat,
}

impl BackupArgs {
    /// Engine options for these arguments
    pub fn to_options(&self) -> BackupOptions {
        BackupOptions {
            full: self.full,
            incremental: self.incremental.is_some(),
            interval: self.incremental.clone(),
            since: self.since,
            until: self.until,
            windows: self.windows,
            target_dir: Some(self.target.clone()),
            overwrite: self.overwrite,
            workers: Some(self.workers),
            format: self.format,
        }
    }
}

/// Totals across every database backed up by one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupTotals {
    pub databases: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Windows left unclaimed by cancellation
    pub cancelled: usize,
    /// Servers or databases never started because of cancellation
    pub not_started: Vec<String>,
}

impl BackupTotals {
    fn record(&mut self, result: &BackupResult) {
        self.databases += 1;
        self.succeeded += result.succeeded.len();
        self.skipped += result.skipped.len();
        self.failed += result.failed.len();
        self.cancelled += result.cancelled();
    }

    /// Whether cancellation left any work undone
    pub fn is_interrupted(&self) -> bool {
        self.cancelled > 0 || !self.not_started.is_empty()
    }

    /// The invocation succeeds only if no window failed and nothing was cut short
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.is_interrupted()
    }
}

/// Handle the backup command
///
/// Options are validated before the configuration file is read, so invalid
/// flags fail fast. Returns `Err` only for pre-flight failures; window
/// failures are reported in the returned totals.
pub async fn handle_backup_command(
    args: &BackupArgs,
    cancel: CancellationToken,
) -> Result<BackupTotals> {
    let request = resolve_now(args.to_options())?;
    let config_path = resolve_config_path(args.config.as_deref())?;
    let settings = Settings::load(&config_path)?;
    let paths = BackupPaths::new(&request.target_dir)?;
    let label = request.mode.label();

    let mut totals = BackupTotals::default();

    for (name, server) in &settings.servers {
        if cancel.is_cancelled() {
            warn!(server = %name, "Cancelled, not starting server");
            totals.not_started.push(format!("{} (all databases)", name));
            continue;
        }

        println!("Backing up: {}", name);
        let client = build_client(server)?;
        let databases = list_databases(&client, server).await?;
        info!(server = %name, databases = databases.len(), "Selected databases");

        for database in databases {
            if cancel.is_cancelled() {
                warn!(server = %name, database = %database, "Cancelled, not starting database");
                totals.not_started.push(format!("{}/{}", name, database));
                continue;
            }

            let target_dir = paths.snapshot_dir(name, &database, &label);
            let db_request = request.with_target_dir(target_dir);
            let source = Arc::new(InfluxSource::new(client.clone(), server, &database));

            let scheduler = Scheduler::new(source)
                .with_retry_policy(RetryPolicy::with_max_attempts(server.retries))
                .with_cancellation(cancel.clone());

            let result = scheduler.run(&db_request).await?;
            println!("{}", format_run_summary(name, &database, &label, &result));
            totals.record(&result);
        }
    }

    println!(
        "Done: {} database(s), {} succeeded, {} skipped, {} failed.",
        totals.databases, totals.succeeded, totals.skipped, totals.failed
    );

    if totals.is_interrupted() {
        println!(
            "Interrupted: {} window(s) cancelled, {} not started.",
            totals.cancelled,
            totals.not_started.len()
        );
        for pending in &totals.not_started {
            println!("  Not started: {}", pending);
        }
        println!("Re-run the same command to resume.");
    }

    Ok(totals)
}

/// Parse a UTC timestamp from RFC 3339, `YYYY-MM-DDTHH:MM:SS`, or `YYYY-MM-DD`
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(BackupError::config(format!(
        "invalid timestamp '{}': expected RFC 3339 or YYYY-MM-DD",
        input
    )))
}
