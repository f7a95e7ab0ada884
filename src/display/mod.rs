//! Display formatting for terminal output
//!
//! Provides utilities for formatting backup results and database listings
//! for terminal display.

pub mod summary;

pub use summary::{format_database_list, format_run_summary};
