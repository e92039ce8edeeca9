//! Identity-floor walk
//!
//! The most robust strategy: instead of trusting `startAt`, every request
//! asks for identities strictly greater than the maximum seen so far, with
//! an ascending identity ordering forced onto the query. A server that
//! ignores offsets entirely cannot defeat this walk.

use super::types::{cap_reached, PaginationStrategy, PartialReason, StrategyKind, StrategyOutcome, WalkContext};
use crate::http::{BackoffController, BackoffControllerConfig};
use crate::query;
use crate::types::PageCursor;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Identity-ordered walk filtering on `id > last_max_id`
#[derive(Debug, Clone, Copy, Default)]
pub struct IdRange;

impl IdRange {
    /// Create the strategy
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaginationStrategy for IdRange {
    fn kind(&self) -> StrategyKind {
        StrategyKind::IdRange
    }

    async fn run(&self, ctx: &mut WalkContext<'_>) -> StrategyOutcome {
        let config = ctx.client.config().clone();
        let page_size = config.page_size;
        let base_jql = ctx.query.jql();

        // Error-driven pacing for the boundary-skip loop: failures widen the
        // delay before the next attempt, a clean page resets it.
        let mut pacing = BackoffController::new(BackoffControllerConfig {
            base_delay: config.initial_backoff,
            factor: 2.0,
            max_delay: config.max_backoff,
        });

        let mut last_max_id: Option<u64> = None;
        let mut pages: u32 = 0;
        let mut error_skips: u32 = 0;

        loop {
            if ctx.cancel.is_cancelled() {
                return StrategyOutcome::Cancelled;
            }
            if let Some(reason) = cap_reached(&config, ctx.acc.len(), pages) {
                warn!(
                    "id-range walk stopping early ({reason}), keeping {} records",
                    ctx.acc.len()
                );
                return StrategyOutcome::Partial(reason);
            }

            let jql = match last_max_id {
                None => query::with_identity_order(base_jql),
                Some(floor) => query::with_id_floor(base_jql, floor),
            };

            // Always startAt=0: the floor in the query does the paging
            let page = match ctx
                .client
                .search_page(&jql, &PageCursor::start(), page_size, ctx.fields)
                .await
            {
                Ok(page) => {
                    pacing.report_success();
                    page
                }
                Err(e) => {
                    error_skips += 1;
                    if error_skips > config.max_error_skips {
                        warn!(
                            "id-range walk giving up after {error_skips} failed boundaries: {e}; keeping {} records",
                            ctx.acc.len()
                        );
                        return StrategyOutcome::Partial(PartialReason::TransportErrors);
                    }
                    let delay = pacing.report_error();
                    warn!(
                        "page beyond id {last_max_id:?} failed after retries: {e}; continuing in {delay:?}"
                    );
                    // Step past the failing boundary so the same request is
                    // never retried forever.
                    last_max_id = last_max_id.map(|floor| floor + 1);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };
            pages += 1;
            ctx.pages_fetched += 1;

            if page.is_empty() {
                debug!("empty page beyond id {last_max_id:?}, walk complete");
                return StrategyOutcome::Complete;
            }

            let page_len = page.len();
            let max_id = page.max_numeric_id();
            ctx.acc.extend(page.records);
            ctx.report_progress();

            let Some(max_id) = max_id else {
                warn!(
                    "no parseable numeric identity on page beyond id {last_max_id:?}; stopping with {} records",
                    ctx.acc.len()
                );
                return StrategyOutcome::Partial(PartialReason::NoNumericIds);
            };

            if page_len < page_size as usize {
                return StrategyOutcome::Complete;
            }

            // Forward-only: the next floor is strictly above everything seen
            last_max_id = Some(last_max_id.map_or(max_id, |floor| max_id.max(floor)));
        }
    }
}
