use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use influxdb_backup::cli::{handle_backup_command, handle_databases_command, BackupArgs, DatabasesArgs};
use influxdb_backup::BackupError;

#[derive(Parser)]
#[command(
    name = "influxdb-backup",
    version,
    about = "Incremental InfluxDB backups to JSON snapshot files",
    long_about = "influxdb-backup splits a time range into windows, fetches each window \
                  from InfluxDB with a pool of concurrent workers, and writes one \
                  snapshot file per window. Re-running the same command resumes: \
                  windows that already have a snapshot are skipped."
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up every matching database of every configured server
    Backup(BackupArgs),

    /// List the databases that would be backed up
    #[command(alias = "dbs")]
    Databases(DatabasesArgs),
}

/// Process outcome, mapped to the exit code
enum Completion {
    Success,
    /// Some window failed or cancellation left work undone
    Incomplete,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(Completion::Success) => ExitCode::SUCCESS,
        Ok(Completion::Incomplete) => ExitCode::from(1),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<Completion> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Backup(args) => {
                let cancel = CancellationToken::new();
                spawn_ctrl_c_handler(cancel.clone());

                let totals = handle_backup_command(&args, cancel).await.map_err(report)?;
                if totals.is_success() {
                    Ok(Completion::Success)
                } else {
                    Ok(Completion::Incomplete)
                }
            }
            Commands::Databases(args) => {
                handle_databases_command(&args).await.map_err(report)?;
                Ok(Completion::Success)
            }
        }
    })
}

fn report(err: BackupError) -> anyhow::Error {
    error!(error = %err, "Command failed");
    err.into()
}

/// Cancel the run on Ctrl-C; in-flight windows still finish
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight windows");
            cancel.cancel();
        }
    });
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
