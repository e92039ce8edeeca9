//! Sequential offset walk
//!
//! The classic page loop: increasing numeric offset, one request at a time,
//! honoring a server-issued cursor token when one appears. Built to survive
//! servers that stop advancing: a page whose identities are all already
//! accumulated counts as "stuck", and two stuck pages in a row end the walk
//! as a documented server limitation rather than an error.

use super::types::{cap_reached, PaginationStrategy, PartialReason, StrategyKind, StrategyOutcome, WalkContext};
use crate::types::PageCursor;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Offset-based page walk with stuck-page detection
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl Sequential {
    /// Create the strategy
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaginationStrategy for Sequential {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Sequential
    }

    async fn run(&self, ctx: &mut WalkContext<'_>) -> StrategyOutcome {
        let config = ctx.client.config().clone();
        let page_size = config.page_size;
        let jql = ctx.query.to_jql_string();

        let mut cursor = PageCursor::start();
        let mut offset: u64 = 0;
        let mut pages: u32 = 0;
        let mut consecutive_stuck: u32 = 0;

        loop {
            if ctx.cancel.is_cancelled() {
                return StrategyOutcome::Cancelled;
            }
            if let Some(reason) = cap_reached(&config, ctx.acc.len(), pages) {
                warn!(
                    "sequential walk stopping early ({reason}), keeping {} records",
                    ctx.acc.len()
                );
                return StrategyOutcome::Partial(reason);
            }

            let page = match ctx
                .client
                .search_page(&jql, &cursor, page_size, ctx.fields)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        "page fetch at {cursor:?} failed after retries: {e}; keeping {} records",
                        ctx.acc.len()
                    );
                    return StrategyOutcome::Partial(PartialReason::TransportErrors);
                }
            };
            pages += 1;
            ctx.pages_fetched += 1;

            if page.is_empty() {
                debug!("empty page at {cursor:?}, walk complete");
                return StrategyOutcome::Complete;
            }

            // Stuck detection must look at the page before it is merged
            if ctx.acc.all_seen(&page.records) {
                consecutive_stuck += 1;
                warn!(
                    "page at {cursor:?} contained only already-seen records ({consecutive_stuck} consecutive)"
                );
                if consecutive_stuck >= 2 {
                    return StrategyOutcome::Partial(PartialReason::StuckPages);
                }
            } else {
                consecutive_stuck = 0;
            }

            let page_len = page.len();
            let is_last = page.is_last;
            let next_cursor = page.next_cursor.clone();
            offset += page_len as u64;

            ctx.acc.extend(page.records);
            ctx.report_progress();

            // Incomplete page = last page, unless a trustworthy total says
            // the server still owes us records.
            let short = page_len < page_size as usize;
            let below_confirmed = ctx
                .confirmed_total
                .is_some_and(|total| ctx.acc.len() < total);
            if short || is_last {
                if below_confirmed {
                    debug!(
                        "page looked final at {} records but confirmed total is {:?}; continuing defensively",
                        ctx.acc.len(),
                        ctx.confirmed_total
                    );
                } else {
                    return StrategyOutcome::Complete;
                }
            }

            // A server cursor wins over our own offset arithmetic
            cursor = match next_cursor {
                Some(token) => PageCursor::Token(token),
                None => PageCursor::Offset(offset),
            };
        }
    }
}
