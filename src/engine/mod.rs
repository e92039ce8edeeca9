//! Fetch engine
//!
//! The coordinator over strategy selection. One probe request decides
//! whether anything exists and how far the server's reported total can be
//! trusted; the engine then picks a walk strategy, drives it to an outcome,
//! re-runs the identity walk when the first choice is defeated, and
//! finalizes the deduplicated result.
//!
//! Failure semantics: only probe-stage transport errors propagate to the
//! caller. Everything after the probe degrades to a best-effort partial
//! result, surfaced through logs and [`FetchStats`], never the error type.

mod types;

pub use types::{FetchResult, FetchStats};

use crate::config::FetchConfig;
use crate::dedup::DedupAccumulator;
use crate::error::{Error, Result};
use crate::http::ApiClient;
use crate::pagination::{
    IdRange, PaginationStrategy, Parallel, Sequential, StrategyKind, StrategyOutcome, WalkContext,
};
use crate::query;
use crate::types::{CancelToken, PageCursor, ProgressCallback, ProgressReporter, Query};
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{debug, warn};

/// Coordinates a complete, deduplicated fetch of a query's result set
pub struct FetchEngine {
    client: ApiClient,
    fields: Option<Vec<String>>,
}

impl FetchEngine {
    /// Create an engine for the given config
    pub fn new(config: FetchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: ApiClient::new(config),
            fields: None,
        })
    }

    /// Create an engine around an existing worker
    pub fn with_client(client: ApiClient) -> Self {
        Self {
            client,
            fields: None,
        }
    }

    /// Narrow record payloads to these fields on every request
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// The config this engine runs with
    pub fn config(&self) -> &FetchConfig {
        self.client.config()
    }

    /// Fetch the complete, deduplicated result set for a query.
    ///
    /// The progress callback fires at least once per accumulated page and a
    /// final time with `fetched == result.len()`. Only a probe-stage
    /// transport error is returned as `Err`; later anomalies degrade to a
    /// partial result documented in the stats.
    pub async fn fetch_all(
        &self,
        query: &Query,
        progress: Option<ProgressCallback>,
    ) -> Result<FetchResult> {
        self.fetch_all_with_cancel(query, progress, &CancelToken::new())
            .await
    }

    /// [`fetch_all`](Self::fetch_all) with caller-initiated cancellation.
    ///
    /// Cancelling ends the walk between pages; whatever was accumulated is
    /// still returned, marked cancelled in the stats.
    pub async fn fetch_all_with_cancel(
        &self,
        query: &Query,
        progress: Option<ProgressCallback>,
        cancel: &CancelToken,
    ) -> Result<FetchResult> {
        let start = Instant::now();
        let config = self.client.config();
        let reporter = ProgressReporter::new(progress);

        // Probe: one record, minimal payload. This is the only request whose
        // failure the caller sees.
        let probe_fields = vec!["id".to_string()];
        let probe = self
            .client
            .search_page(
                &query.to_jql_string(),
                &PageCursor::start(),
                1,
                Some(&probe_fields),
            )
            .await?;

        if probe.is_empty() {
            debug!("probe found no records");
            reporter.report(0, 0);
            return Ok(FetchResult {
                records: Vec::new(),
                stats: FetchStats {
                    pages_fetched: 1,
                    duration_ms: start.elapsed().as_millis() as u64,
                    ..FetchStats::default()
                },
            });
        }

        let (total_estimate, confirmed_total) = self.assess_total(query, &probe).await;
        let kind = select_strategy(query, total_estimate, config.page_size);
        debug!(
            "selected {kind} strategy (reported total {}, estimate {total_estimate}, confirmed {confirmed_total:?})",
            probe.total_reported
        );

        let mut acc = DedupAccumulator::new();
        let mut ctx = WalkContext {
            client: &self.client,
            query,
            fields: self.fields.as_deref(),
            acc: &mut acc,
            progress: &reporter,
            cancel,
            total_estimate,
            confirmed_total,
            pages_fetched: 1,
        };

        let mut outcome = run_strategy(kind, &mut ctx).await;
        let mut fallback_occurred = false;
        if outcome == StrategyOutcome::Fallback {
            fallback_occurred = true;
            warn!("{kind} strategy defeated by the server; re-running with the identity walk");
            outcome = run_strategy(StrategyKind::IdRange, &mut ctx).await;
        }
        let pages_fetched = ctx.pages_fetched;

        let records = acc.into_records();
        let fetched = records.len() as u64;
        reporter.report(fetched, fetched);

        if let Some(reason) = outcome.partial_reason() {
            warn!("fetch finished partially ({reason}); returning {fetched} records");
        }

        Ok(FetchResult {
            records,
            stats: FetchStats {
                records: fetched,
                pages_fetched,
                strategy: Some(kind),
                fallback_occurred,
                partial_reason: outcome.partial_reason(),
                cancelled: outcome == StrategyOutcome::Cancelled,
                failures: 0,
                duration_ms: start.elapsed().as_millis() as u64,
            },
        })
    }

    /// Fetch individual issues by key or id over a bounded pool.
    ///
    /// No pagination strategy involved: a pure fan-out through the same
    /// worker and rate limiter. Missing issues and per-key failures are
    /// logged and skipped, never raised.
    pub async fn fetch_details(
        &self,
        keys: &[String],
        progress: Option<ProgressCallback>,
    ) -> Result<FetchResult> {
        let start = Instant::now();
        let reporter = ProgressReporter::new(progress);
        let total = keys.len() as u64;
        let client_ref = &self.client;
        let fields = self.fields.clone();

        let mut tasks = stream::iter(keys.iter().cloned())
            .map(|key| {
                let client = client_ref.clone();
                let fields = fields.clone();
                async move {
                    let result = client.fetch_issue(&key, fields.as_deref()).await;
                    (key, result)
                }
            })
            .buffer_unordered(self.client.config().parallel_workers);

        let mut acc = DedupAccumulator::new();
        let mut failures: u64 = 0;
        while let Some((key, result)) = tasks.next().await {
            match result {
                Ok(record) => {
                    acc.push(record);
                }
                Err(Error::IssueNotFound { .. }) => {
                    warn!("issue '{key}' not found, skipping");
                    failures += 1;
                }
                Err(e) => {
                    warn!("fetching issue '{key}' failed: {e}");
                    failures += 1;
                }
            }
            reporter.report(acc.len(), total);
        }
        drop(tasks);

        let records = acc.into_records();
        let fetched = records.len() as u64;
        reporter.report(fetched, fetched);

        Ok(FetchResult {
            records,
            stats: FetchStats {
                records: fetched,
                pages_fetched: total,
                strategy: None,
                failures,
                duration_ms: start.elapsed().as_millis() as u64,
                ..FetchStats::default()
            },
        })
    }

    /// Decide how far the reported total can be trusted.
    ///
    /// Returns `(advisory_estimate, confirmed_total)`. A zero total for a
    /// query that just produced a record is a known server defect; round
    /// totals matching the configured multiples are cross-checked against
    /// the approximate count before being believed.
    async fn assess_total(&self, query: &Query, probe: &crate::types::Page) -> (u64, Option<u64>) {
        let config = self.client.config();
        let reported = probe.total_reported;

        if reported == 0 {
            warn!("server reported a zero total for a query with records; consulting approximate count");
            return match self.client.approximate_count(query.jql()).await {
                Ok(count) => (count.max(1), None),
                Err(e) => {
                    debug!("approximate count unavailable: {e}");
                    (1, None)
                }
            };
        }

        if query::is_suspicious_total(reported, &config.suspicious_total_multiples) {
            return match self.client.approximate_count(query.jql()).await {
                Ok(count) if count == reported => (reported, Some(reported)),
                Ok(count) => {
                    debug!(
                        "approximate count {count} disagrees with suspicious reported total {reported}"
                    );
                    (reported.max(count), None)
                }
                Err(e) => {
                    debug!("approximate count unavailable: {e}");
                    (reported, None)
                }
            };
        }

        (reported, Some(reported))
    }
}

impl std::fmt::Debug for FetchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchEngine")
            .field("client", &self.client)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Explicit dispatch over the three strategies
async fn run_strategy(kind: StrategyKind, ctx: &mut WalkContext<'_>) -> StrategyOutcome {
    match kind {
        StrategyKind::Sequential => Sequential::new().run(ctx).await,
        StrategyKind::IdRange => IdRange::new().run(ctx).await,
        StrategyKind::Parallel => Parallel::new().run(ctx).await,
    }
}

/// Pick the walk strategy for a query.
///
/// The identity walk is the default: it is the only one immune to ignored
/// offsets. A caller-supplied ordering rules it out (the walk would rewrite
/// ORDER BY); with a usable total estimate the parallel fan-out takes over,
/// otherwise the plain sequential walk.
fn select_strategy(query: &Query, total_estimate: u64, page_size: u32) -> StrategyKind {
    if query.order_hint().is_none() {
        StrategyKind::IdRange
    } else if total_estimate > u64::from(page_size) {
        StrategyKind::Parallel
    } else {
        StrategyKind::Sequential
    }
}
