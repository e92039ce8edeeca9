//! # issue-trawler
//!
//! A resilient bulk-retrieval engine for Jira-style issue trackers whose
//! pagination cannot be trusted: stale or zero totals, `startAt` silently
//! ignored beyond certain thresholds, duplicate pages. The engine
//! reconciles the server's conflicting signals and still returns a
//! complete, deduplicated record set under bounded request budgets.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use issue_trawler::{FetchConfig, FetchEngine, Query, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = FetchConfig::new("https://tracker.example.com/rest/api/3")
//!         .with_credentials("dev@example.com", "api-token");
//!     let engine = FetchEngine::new(config)?;
//!
//!     let result = engine
//!         .fetch_all(
//!             &Query::new("project = PROJ AND status != Done"),
//!             Some(Box::new(|fetched, total| {
//!                 eprintln!("{fetched}/{total}");
//!             })),
//!         )
//!         .await?;
//!
//!     println!("{} unique records", result.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        FetchEngine                          │
//! │  probe → assess total → select strategy → walk → finalize   │
//! └─────────────────────────────────────────────────────────────┘
//!                │                │                 │
//! ┌──────────────┴───┬────────────┴─────┬───────────┴──────────┐
//! │    Sequential    │     IdRange      │       Parallel       │
//! │  offset walk     │  id > N floors   │  bounded fan-out     │
//! │  stuck detection │  offset-immune   │  offset-ignore probe │
//! └──────────────────┴──────────────────┴──────────────────────┘
//!                │                │                 │
//! ┌──────────────┴────────────────┴─────────────────┴──────────┐
//! │   ApiClient — retry, backoff, 429/Retry-After, timeout     │
//! │   RateLimiter — global min spacing across all workers      │
//! │   DedupAccumulator — one identity, one record              │
//! └────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Domain model: queries, records, identities, pages
pub mod types;

/// Runtime configuration and the CLI profile format
pub mod config;

/// HTTP worker, rate limiting, adaptive pacing
pub mod http;

/// JQL string helpers
pub mod query;

/// Record deduplication
pub mod dedup;

/// Pagination strategies
pub mod pagination;

/// The fetch engine (coordination, fallback, finalization)
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{Credentials, FetchConfig, Profile};
pub use engine::{FetchEngine, FetchResult, FetchStats};
pub use error::{Error, Result};
pub use types::{CancelToken, Identity, Page, PageCursor, ProgressCallback, Query, Record};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
