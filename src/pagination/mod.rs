//! Pagination strategies
//!
//! Three ways of walking a full result set out of a server whose pagination
//! is unreliable, behind one trait:
//!
//! - [`Sequential`] — offset walk with stuck-page detection
//! - [`IdRange`] — identity-floor walk, immune to ignored offsets
//! - [`Parallel`] — concurrent offset fan-out with offset-ignore probing
//!
//! Strategies never raise pagination anomalies as errors; they end a walk
//! with an explicit [`StrategyOutcome`] and leave whatever was accumulated
//! in place.

mod id_range;
mod parallel;
mod sequential;
mod types;

pub use id_range::IdRange;
pub use parallel::Parallel;
pub use sequential::Sequential;
pub use types::{PaginationStrategy, PartialReason, StrategyKind, StrategyOutcome, WalkContext};
