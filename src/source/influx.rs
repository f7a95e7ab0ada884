//! InfluxDB 0.8 HTTP data source
//!
//! Range queries are issued against `/db/{database}/series` with basic auth.
//! Chunked responses arrive as a stream of concatenated JSON values, so the
//! body is decoded value by value rather than as a single document.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::config::settings::ServerConfig;
use crate::error::{classify_status, BackupError, Result};
use crate::models::{earliest, RecordSet};

/// Build an HTTP client honoring the server's request timeout
pub fn build_client(server: &ServerConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(server.timeout_secs))
        .build()
        .map_err(|e| BackupError::config(format!("Failed to build HTTP client: {}", e)))
}

/// Range-query data source for one database on one server
#[derive(Debug, Clone)]
pub struct InfluxSource {
    client: Client,
    base_url: String,
    database: String,
    username: String,
    password: String,
    table_regex: String,
    chunked: bool,
}

impl InfluxSource {
    /// Create a source for `database`, sharing `client` across databases
    pub fn new(client: Client, server: &ServerConfig, database: impl Into<String>) -> Self {
        Self {
            client,
            base_url: server.base_url(),
            database: database.into(),
            username: server.username.clone(),
            password: server.password.clone(),
            table_regex: server.table_regex.clone(),
            chunked: server.chunked,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn series_url(&self) -> String {
        format!("{}/db/{}/series", self.base_url, self.database)
    }

    /// Query text selecting every series point in `[start, end)`
    pub fn range_query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        if start <= earliest() {
            format!(
                "select * from {} where time < {}s",
                self.table_regex,
                end.timestamp()
            )
        } else {
            format!(
                "select * from {} where time >= {}s and time < {}s",
                self.table_regex,
                start.timestamp(),
                end.timestamp()
            )
        }
    }
}

#[async_trait]
impl DataSource for InfluxSource {
    async fn query_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<RecordSet> {
        let query = self.range_query(start, end);
        debug!(database = %self.database, %query, "Querying series");

        let response = self
            .client
            .get(self.series_url())
            .basic_auth(&self.username, Some(&self.password))
            .query(&[
                ("q", query.as_str()),
                ("chunked", if self.chunked { "true" } else { "false" }),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body.trim()));
        }

        let body = response.bytes().await?;
        parse_records(&body)
    }

    async fn probe(&self) -> Result<()> {
        let url = format!("{}/ping", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackupError::Unavailable(format!("{}: {}", url, e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackupError::Unavailable(format!(
                "{} returned HTTP {}",
                url,
                response.status().as_u16()
            )))
        }
    }
}

/// Decode a series response body into records
///
/// Accepts a single array (non-chunked) or a stream of concatenated values
/// (chunked); arrays are flattened. A body cut off mid-value is transient,
/// anything else unparseable is terminal.
pub fn parse_records(body: &[u8]) -> Result<RecordSet> {
    let mut records = Vec::new();

    for value in serde_json::Deserializer::from_slice(body).into_iter::<Value>() {
        match value {
            Ok(Value::Array(items)) => records.extend(items),
            Ok(Value::Null) => {}
            Ok(other) => records.push(other),
            Err(e) if e.is_eof() => {
                return Err(BackupError::Transient(format!(
                    "truncated response body: {}",
                    e
                )))
            }
            Err(e) => {
                return Err(BackupError::Terminal(format!(
                    "malformed response body: {}",
                    e
                )))
            }
        }
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct DatabaseEntry {
    name: String,
}

/// List the server's databases, keeping those matching `db_regex`
///
/// Runs before any window is dispatched, so every failure is reported as
/// `Unavailable` and aborts the server's backup.
pub async fn list_databases(client: &Client, server: &ServerConfig) -> Result<Vec<String>> {
    let url = format!("{}/db", server.base_url());
    let matcher = server.db_matcher()?;

    let response = client
        .get(&url)
        .basic_auth(&server.username, Some(&server.password))
        .send()
        .await
        .map_err(|e| BackupError::Unavailable(format!("{}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(BackupError::Unavailable(format!(
            "{} returned HTTP {}",
            url,
            status.as_u16()
        )));
    }

    let entries: Vec<DatabaseEntry> = response
        .json()
        .await
        .map_err(|e| BackupError::Unavailable(format!("{}: {}", url, e)))?;

    Ok(filter_databases(
        entries.into_iter().map(|e| e.name),
        matcher.as_ref(),
    ))
}

/// Keep database names matching `matcher` (all of them when `None`)
///
/// The match is anchored at the start of the name but not at the end, so
/// `metrics` keeps `metrics_old` and drops `old_metrics`.
pub fn filter_databases(
    names: impl IntoIterator<Item = String>,
    matcher: Option<&Regex>,
) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| matcher.map_or(true, |re| matches_prefix(re, name)))
        .collect()
}

fn matches_prefix(re: &Regex, name: &str) -> bool {
    re.find(name).is_some_and(|m| m.start() == 0)
}
