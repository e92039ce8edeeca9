//! CLI module
//!
//! Command-line interface for running fetches against a tracker.
//!
//! # Commands
//!
//! - `search` - Fetch the complete result set for a JQL query
//! - `count` - Ask the server for its approximate match count
//! - `show` - Fetch individual issues by key

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
