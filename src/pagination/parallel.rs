//! Concurrent offset fan-out
//!
//! Splits an upfront (untrusted) total into `ceil(total / page_size)` page
//! tasks and runs them over a bounded pool. The page at offset 0 is fetched
//! first and its leading identities become the reference prefix: any later
//! page that opens with the same prefix proves the server is ignoring
//! `startAt`, at which point the remaining tasks are dropped and the engine
//! is told to fall back.

use super::types::{PaginationStrategy, PartialReason, StrategyKind, StrategyOutcome, WalkContext};
use crate::types::PageCursor;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

/// How many leading identities form the offset-ignore reference prefix
const LEADING_PROBE: usize = 3;

/// Concurrent offset walk over a bounded worker pool
#[derive(Debug, Clone, Copy, Default)]
pub struct Parallel;

impl Parallel {
    /// Create the strategy
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaginationStrategy for Parallel {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Parallel
    }

    async fn run(&self, ctx: &mut WalkContext<'_>) -> StrategyOutcome {
        let config = ctx.client.config().clone();
        let page_size = config.page_size;
        let jql = ctx.query.to_jql_string();

        // Reference page at offset 0
        let first = match ctx
            .client
            .search_page(&jql, &PageCursor::start(), page_size, ctx.fields)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                warn!("reference page fetch failed after retries: {e}");
                return StrategyOutcome::Partial(PartialReason::TransportErrors);
            }
        };
        ctx.pages_fetched += 1;

        let reference = first.leading_identities(LEADING_PROBE);
        let first_len = first.len();
        ctx.acc.extend(first.records);
        ctx.report_progress();

        if first_len < page_size as usize {
            // The whole result fit in one page
            return StrategyOutcome::Complete;
        }

        let total = ctx.total_estimate.max(ctx.acc.len());
        let page_count = total.div_ceil(u64::from(page_size)).min(u64::from(config.max_pages));
        if page_count <= 1 {
            return StrategyOutcome::Complete;
        }
        debug!(
            "fanning out {} page tasks over {} workers (estimated total {total})",
            page_count - 1,
            config.parallel_workers
        );

        let fields_owned: Option<Vec<String>> = ctx.fields.map(<[String]>::to_vec);
        let client_ref = ctx.client;
        let mut tasks = stream::iter(1..page_count)
            .map(|index| {
                let client = client_ref.clone();
                let jql = jql.clone();
                let fields = fields_owned.clone();
                let offset = index * u64::from(page_size);
                async move {
                    let result = client
                        .search_page(&jql, &PageCursor::Offset(offset), page_size, fields.as_deref())
                        .await;
                    (offset, result)
                }
            })
            .buffer_unordered(config.parallel_workers);

        let mut failures: u32 = 0;
        while let Some((offset, result)) = tasks.next().await {
            if ctx.cancel.is_cancelled() {
                return StrategyOutcome::Cancelled;
            }
            match result {
                Ok(page) => {
                    ctx.pages_fetched += 1;
                    if !reference.is_empty()
                        && page.leading_identities(LEADING_PROBE) == reference
                    {
                        // Same opening records as offset 0: startAt is being
                        // ignored. Dropping the stream cancels everything
                        // still in flight or queued.
                        warn!(
                            "offset {offset} returned the same leading records as offset 0; server ignores startAt"
                        );
                        return StrategyOutcome::Fallback;
                    }
                    ctx.acc.extend(page.records);
                    ctx.report_progress();
                    if ctx.acc.len() >= config.max_records {
                        warn!(
                            "record safety cap reached mid fan-out, keeping {} records",
                            ctx.acc.len()
                        );
                        return StrategyOutcome::Partial(PartialReason::RecordCap);
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!("page at offset {offset} failed after retries: {e}");
                }
            }
        }

        if failures > 0 {
            warn!("{failures} page tasks failed; result may be incomplete");
            return StrategyOutcome::Partial(PartialReason::TransportErrors);
        }
        StrategyOutcome::Complete
    }
}
