//! Strategy types and traits
//!
//! Defines the walk context every strategy runs against and the explicit
//! outcome signal that replaces exception-driven loop termination.

use crate::config::FetchConfig;
use crate::dedup::DedupAccumulator;
use crate::http::ApiClient;
use crate::types::{CancelToken, ProgressReporter, Query};
use async_trait::async_trait;

/// The three walk algorithms, used for explicit dispatch and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Offset walk, one page at a time
    Sequential,
    /// Identity-floor walk, immune to ignored offsets
    IdRange,
    /// Concurrent offset fan-out
    Parallel,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StrategyKind::Sequential => "sequential",
            StrategyKind::IdRange => "id-range",
            StrategyKind::Parallel => "parallel",
        };
        f.write_str(name)
    }
}

/// Why a walk ended early with a partial (but still valid) result.
///
/// None of these are errors: the accumulated records stand and the cause is
/// surfaced through logs and fetch statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialReason {
    /// The server stopped advancing: two consecutive pages contained only
    /// already-accumulated identities
    StuckPages,
    /// The accumulated-record safety cap was hit
    RecordCap,
    /// The per-walk page count safety cap was hit
    PageCap,
    /// A page failed after exhausting the retry budget mid-walk
    TransportErrors,
    /// No record on a page carried a parseable numeric identity, so the
    /// identity walk cannot continue
    NoNumericIds,
}

impl std::fmt::Display for PartialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            PartialReason::StuckPages => "server stopped advancing pages",
            PartialReason::RecordCap => "record safety cap reached",
            PartialReason::PageCap => "page safety cap reached",
            PartialReason::TransportErrors => "transport errors mid-walk",
            PartialReason::NoNumericIds => "no parseable numeric identities",
        };
        f.write_str(reason)
    }
}

/// How a strategy's walk ended.
///
/// The loop threads this signal explicitly instead of raising; only the
/// engine decides what each variant means for the overall fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// Natural termination; the accumulated set is believed complete
    Complete,
    /// Early termination with a documented cause; accumulated records stand
    Partial(PartialReason),
    /// The server defeated this strategy; the engine should re-run another
    Fallback,
    /// Caller-initiated cancellation between iterations
    Cancelled,
}

impl StrategyOutcome {
    /// Whether the walk believes it saw the whole result set
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// The partial-termination cause, if any
    pub fn partial_reason(&self) -> Option<PartialReason> {
        match self {
            Self::Partial(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Everything a strategy needs to walk one query.
///
/// The accumulator is shared across a fallback re-run, so a second strategy
/// extends (never shrinks) what the first one gathered.
pub struct WalkContext<'a> {
    /// Request worker (shared rate limiter rides inside)
    pub client: &'a ApiClient,
    /// The caller's query
    pub query: &'a Query,
    /// Optional field narrowing for record payloads
    pub fields: Option<&'a [String]>,
    /// Shared deduplicating accumulator
    pub acc: &'a mut DedupAccumulator,
    /// Progress sink; strategies report after every accumulated page
    pub progress: &'a ProgressReporter,
    /// Cooperative cancellation flag
    pub cancel: &'a CancelToken,
    /// Advisory total for progress reports; may be stale or zero
    pub total_estimate: u64,
    /// A total the engine verified as trustworthy, if any
    pub confirmed_total: Option<u64>,
    /// Pages fetched across all strategy runs of this fetch
    pub pages_fetched: u64,
}

impl WalkContext<'_> {
    /// Report progress with the current accumulated count.
    ///
    /// The advisory total is clamped up so `fetched <= total` always holds
    /// in what callers observe.
    pub fn report_progress(&self) {
        let fetched = self.acc.len();
        self.progress.report(fetched, self.total_estimate.max(fetched));
    }
}

/// One algorithm for walking a full result set.
///
/// Implementations must degrade, not fail: transport errors after the retry
/// budget and pagination anomalies end the walk with an outcome, leaving the
/// accumulator intact.
#[async_trait]
pub trait PaginationStrategy: Send + Sync {
    /// Which algorithm this is
    fn kind(&self) -> StrategyKind;

    /// Walk the query to an outcome, accumulating into `ctx.acc`
    async fn run(&self, ctx: &mut WalkContext<'_>) -> StrategyOutcome;
}

/// Shared cap check: record and page safety limits
pub(crate) fn cap_reached(
    config: &FetchConfig,
    accumulated: u64,
    pages: u32,
) -> Option<PartialReason> {
    if accumulated >= config.max_records {
        Some(PartialReason::RecordCap)
    } else if pages >= config.max_pages {
        Some(PartialReason::PageCap)
    } else {
        None
    }
}
