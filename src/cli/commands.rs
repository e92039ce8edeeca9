//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// issue-trawler CLI
#[derive(Parser, Debug)]
#[command(name = "issue-trawler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Profile file (YAML)
    #[arg(short, long, global = true)]
    pub profile: Option<PathBuf>,

    /// Base URL of the tracker API (overrides the profile)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Account user for basic auth (overrides the profile)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// API token for basic auth (overrides the profile)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Suppress the progress display
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the complete, deduplicated result set for a JQL query
    Search {
        /// JQL filter expression
        jql: String,

        /// Preserve this ordering instead of the identity walk's own
        #[arg(long)]
        order: Option<String>,

        /// Fields to request (comma-separated, empty = server default)
        #[arg(long)]
        fields: Option<String>,

        /// Records per page
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Ask the server for its approximate match count (advisory)
    Count {
        /// JQL filter expression
        jql: String,
    },

    /// Fetch individual issues by key or id
    Show {
        /// Issue keys (e.g. PROJ-42)
        #[arg(required = true)]
        keys: Vec<String>,

        /// Fields to request (comma-separated, empty = server default)
        #[arg(long)]
        fields: Option<String>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON records (one document)
    Json,
    /// Human-readable summary lines
    Pretty,
}
