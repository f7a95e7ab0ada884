//! Backup run summary formatting
//!
//! Formats backup results for terminal output so operators can tell at a
//! glance whether a re-run is needed.

use crate::models::{BackupResult, RunStatus};

/// Format the summary of one database's backup run
pub fn format_run_summary(server: &str, database: &str, label: &str, result: &BackupResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}/{} ({})\n", server, database, label));
    output.push_str(&format!(
        "  Succeeded: {}  Skipped: {}  Failed: {}  Records: {}\n",
        result.succeeded.len(),
        result.skipped.len(),
        result.failed.len(),
        result.records_written,
    ));

    let cancelled = result.cancelled();
    if cancelled > 0 {
        output.push_str(&format!("  Cancelled before start: {}\n", cancelled));
    }

    output.push_str(&format!("  Status: {}\n", result.status()));

    if !result.failed.is_empty() {
        let window_width = result
            .failed
            .iter()
            .map(|(window, _)| window.to_string().len())
            .max()
            .unwrap_or(6)
            .max(6);

        output.push('\n');
        output.push_str(&format!(
            "  {:<window_width$}  {}\n",
            "Window",
            "Error",
            window_width = window_width
        ));
        output.push_str(&format!(
            "  {:-<window_width$}  {:-<5}\n",
            "",
            "",
            window_width = window_width
        ));
        for (window, err) in &result.failed {
            output.push_str(&format!(
                "  {:<window_width$}  {}\n",
                window.to_string(),
                err,
                window_width = window_width
            ));
        }
    }

    if result.status() == RunStatus::CompletedWithFailures || cancelled > 0 {
        output.push_str("\n  Re-run the same command to resume; committed windows are skipped.\n");
    }

    output
}

/// Format the databases selected for backup on one server
pub fn format_database_list(server: &str, databases: &[String]) -> String {
    if databases.is_empty() {
        return format!("{}: no matching databases\n", server);
    }

    let mut output = format!("{} ({} database(s))\n", server, databases.len());
    for database in databases {
        output.push_str(&format!("  {}\n", database));
    }
    output
}
