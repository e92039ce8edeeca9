//! Fetch configuration
//!
//! Runtime tuning knobs for the retrieval engine, plus the YAML-facing
//! profile format the CLI loads. Every limit the engine honors is injected
//! from here; nothing is a module-level global.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Basic-auth credentials for the tracker API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account user (usually an email address)
    pub user: String,
    /// API token
    pub token: String,
}

/// Configuration for the retrieval engine
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Base URL of the tracker REST API
    pub base_url: String,
    /// Optional basic-auth credentials
    pub credentials: Option<Credentials>,
    /// Records requested per page
    pub page_size: u32,
    /// Retry budget per request (transient failures and 429s)
    pub max_retries: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Global minimum spacing between outbound requests
    pub min_interval: Duration,
    /// Initial delay for exponential retry backoff
    pub initial_backoff: Duration,
    /// Cap for retry backoff delays
    pub max_backoff: Duration,
    /// Sleep applied on a 429 without a Retry-After header
    pub retry_after_default: Duration,
    /// Safety cap on total accumulated records
    pub max_records: u64,
    /// Safety cap on pages fetched by a single strategy run
    pub max_pages: u32,
    /// Bounded pool size for concurrent page/detail fetches
    pub parallel_workers: usize,
    /// Boundary skips tolerated by the id-ordered walk before giving up
    pub max_error_skips: u32,
    /// Reported totals that are exact multiples of any of these values are
    /// treated as suspicious and cross-checked against the approximate count
    pub suspicious_total_multiples: Vec<u64>,
    /// User agent string
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            credentials: None,
            page_size: 100,
            max_retries: 3,
            timeout: Duration::from_secs(30),
            min_interval: Duration::from_millis(250),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            retry_after_default: Duration::from_secs(60),
            max_records: 50_000,
            max_pages: 1_000,
            parallel_workers: 5,
            max_error_skips: 5,
            suspicious_total_multiples: vec![100, 1_000, 5_000],
            user_agent: format!("issue-trawler/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchConfig {
    /// Create a config for the given base URL with defaults everywhere else
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set basic-auth credentials
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, token: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            token: token.into(),
        });
        self
    }

    /// Set the page size
    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Set the retry budget
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the global minimum request spacing
    #[must_use]
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Set retry backoff bounds
    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Set the safety caps
    #[must_use]
    pub fn with_limits(mut self, max_records: u64, max_pages: u32) -> Self {
        self.max_records = max_records;
        self.max_pages = max_pages;
        self
    }

    /// Set the concurrent worker pool size
    #[must_use]
    pub fn with_parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers.max(1);
        self
    }

    /// Validate that required fields are present
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::missing_field("base_url"));
        }
        if self.page_size == 0 {
            return Err(Error::config("page_size must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// YAML profile (CLI)
// ============================================================================

/// YAML-facing profile the CLI loads, converted into a [`FetchConfig`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Base URL of the tracker REST API
    pub base_url: String,
    /// Account user for basic auth
    #[serde(default)]
    pub user: Option<String>,
    /// API token for basic auth
    #[serde(default)]
    pub token: Option<String>,
    /// Records requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Retry budget per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum spacing between requests in milliseconds
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Safety cap on accumulated records
    #[serde(default = "default_max_records")]
    pub max_records: u64,
    /// Safety cap on pages per strategy run
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Concurrent worker pool size
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,
}

fn default_page_size() -> u32 {
    100
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_min_interval_ms() -> u64 {
    250
}
fn default_max_records() -> u64 {
    50_000
}
fn default_max_pages() -> u32 {
    1_000
}
fn default_parallel_workers() -> usize {
    5
}

impl Profile {
    /// Parse a profile from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a profile from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config(format!("cannot read profile: {e}")))?;
        Self::from_yaml_str(&content)
    }

    /// Convert into a runtime config
    pub fn into_config(self) -> FetchConfig {
        let credentials = match (self.user, self.token) {
            (Some(user), Some(token)) => Some(Credentials { user, token }),
            _ => None,
        };
        FetchConfig {
            base_url: self.base_url,
            credentials,
            page_size: self.page_size.max(1),
            max_retries: self.max_retries,
            timeout: Duration::from_secs(self.timeout_secs),
            min_interval: Duration::from_millis(self.min_interval_ms),
            max_records: self.max_records,
            max_pages: self.max_pages,
            parallel_workers: self.parallel_workers.max(1),
            ..FetchConfig::default()
        }
    }
}
