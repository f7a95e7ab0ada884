//! Databases CLI command
//!
//! Lists the databases each configured server would back up, after the
//! server's `db_regex` filter is applied.

use std::path::PathBuf;

use clap::Args;

use crate::config::paths::resolve_config_path;
use crate::config::Settings;
use crate::display::format_database_list;
use crate::error::{BackupError, Result};
use crate::source::influx::build_client;
use crate::source::list_databases;

/// Arguments for `influxdb-backup databases`
#[derive(Args, Debug, Clone)]
pub struct DatabasesArgs {
    /// Configuration file [default: ~/.influxdb_backup.yaml]
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only query this server
    #[arg(short, long)]
    pub server: Option<String>,
}

/// Handle the databases command
pub async fn handle_databases_command(args: &DatabasesArgs) -> Result<()> {
    let config_path = resolve_config_path(args.config.as_deref())?;
    let settings = Settings::load(&config_path)?;

    if let Some(name) = &args.server {
        if !settings.servers.contains_key(name) {
            return Err(BackupError::config(format!(
                "server '{}' is not configured in {}",
                name,
                config_path.display()
            )));
        }
    }

    let selected = settings
        .servers
        .iter()
        .filter(|(name, _)| args.server.as_ref().map_or(true, |wanted| wanted == *name));

    for (name, server) in selected {
        let client = build_client(server)?;
        let databases = list_databases(&client, server).await?;
        print!("{}", format_database_list(name, &databases));
    }

    Ok(())
}
