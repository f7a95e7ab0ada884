//! Configuration file for influxdb-backup
//!
//! The configuration file is YAML mapping a server name to its connection
//! settings:
//!
//! ```yaml
//! production:
//!   host: http://influx.example.com
//!   port: 8086
//!   username: root
//!   password: root
//!   db_regex: "^metrics"
//!   table_regex: "/.*/"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BackupError, Result};

/// Connection and query settings for one InfluxDB server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Scheme and host, e.g. `http://localhost`
    pub host: String,

    /// HTTP API port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Only back up databases whose name matches this regex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_regex: Option<String>,

    /// Series selector used in the `from` clause
    #[serde(default = "default_table_regex")]
    pub table_regex: String,

    /// Ask the server for a chunked response stream
    #[serde(default = "default_chunked")]
    pub chunked: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum fetch attempts per window
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_port() -> u16 {
    8086
}

fn default_table_regex() -> String {
    "/.*/".to_string()
}

fn default_chunked() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retries() -> u32 {
    5
}

impl ServerConfig {
    /// Base URL of the HTTP API, e.g. `http://localhost:8086`
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host.trim_end_matches('/'), self.port)
    }

    /// Compiled `db_regex`, if one is configured
    pub fn db_matcher(&self) -> Result<Option<Regex>> {
        self.db_regex
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    BackupError::config(format!("invalid db_regex '{}': {}", pattern, e))
                })
            })
            .transpose()
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.host.starts_with("http://") && !self.host.starts_with("https://") {
            return Err(BackupError::config(format!(
                "server '{}': host must start with http:// or https://",
                name
            )));
        }
        if self.table_regex.trim().is_empty() {
            return Err(BackupError::config(format!(
                "server '{}': table_regex must not be empty",
                name
            )));
        }
        if self.retries == 0 {
            return Err(BackupError::config(format!(
                "server '{}': retries must be at least 1",
                name
            )));
        }
        self.db_matcher()?;
        Ok(())
    }
}

/// All configured servers, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    pub servers: BTreeMap<String, ServerConfig>,
}

impl Settings {
    /// Load settings from a YAML file
    ///
    /// # Errors
    ///
    /// Fails with `InvalidConfiguration` if the file is missing or invalid.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(BackupError::config(format!(
                "Could not find configuration file {}. Use `-c` or create one at \
                 `~/.influxdb_backup.yaml`",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            BackupError::config(format!("Failed to read configuration file: {}", e))
        })?;

        Self::from_yaml(&contents)
    }

    /// Parse and validate settings from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(contents).map_err(|e| {
            BackupError::config(format!("Failed to parse configuration file: {}", e))
        })?;

        if settings.servers.is_empty() {
            return Err(BackupError::config(
                "configuration file does not define any servers",
            ));
        }

        for (name, server) in &settings.servers {
            server.validate(name)?;
        }

        Ok(settings)
    }
}
