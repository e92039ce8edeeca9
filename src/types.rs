//! Common types used throughout issue-trawler
//!
//! This module contains the domain model shared across modules: queries,
//! records with identity resolution, and pages as returned by the tracker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Query
// ============================================================================

/// An immutable search query: a JQL filter expression plus an optional
/// ordering hint supplied by the caller.
///
/// A caller-supplied ordering makes identity-ordered walking unavailable,
/// which influences strategy selection in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    jql: String,
    order_hint: Option<String>,
}

impl Query {
    /// Create a query from a JQL filter expression
    pub fn new(jql: impl Into<String>) -> Self {
        Self {
            jql: jql.into(),
            order_hint: None,
        }
    }

    /// Attach an explicit ordering clause (e.g. `"created DESC"`)
    #[must_use]
    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order_hint = Some(order.into());
        self
    }

    /// The raw JQL filter expression
    pub fn jql(&self) -> &str {
        &self.jql
    }

    /// The caller-supplied ordering, if any
    pub fn order_hint(&self) -> Option<&str> {
        self.order_hint.as_deref()
    }

    /// The JQL with the ordering hint appended, as sent for strategies that
    /// preserve caller ordering
    pub fn to_jql_string(&self) -> String {
        match &self.order_hint {
            Some(order) if !self.jql.is_empty() => format!("{} ORDER BY {order}", self.jql),
            Some(order) => format!("ORDER BY {order}"),
            None => self.jql.clone(),
        }
    }
}

// ============================================================================
// Identity
// ============================================================================

/// The resolved identity of a record.
///
/// Resolution prefers the `id` field; `key` is the fallback. Two records are
/// the same entity only when their resolved identities compare equal, so an
/// `Id` never matches a `Key` even if the underlying strings coincide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Numeric-ish `id` field, normalized to its string form
    Id(String),
    /// Human-readable `key` field (e.g. `PROJ-42`)
    Key(String),
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::Id(s) => write!(f, "id:{s}"),
            Identity::Key(s) => write!(f, "key:{s}"),
        }
    }
}

// ============================================================================
// Record
// ============================================================================

/// A single issue record as returned by the tracker.
///
/// Records are immutable JSON objects. Zero, one, or both of the identity
/// fields (`id`, `key`) may be present; a record with neither is kept but
/// never deduplicated against others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Value);

impl Record {
    /// Wrap a JSON value as a record
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The underlying JSON value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume the record, returning the JSON value
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Look up a top-level field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Resolve this record's identity: prefer `id`, fall back to `key`.
    ///
    /// Returns `None` for unidentifiable records. Numeric `id` values are
    /// normalized to their string form so the representation is stable for
    /// the duration of a fetch.
    pub fn identity(&self) -> Option<Identity> {
        if let Some(id) = self.get("id").and_then(scalar_to_string) {
            return Some(Identity::Id(id));
        }
        if let Some(key) = self.get("key").and_then(scalar_to_string) {
            return Some(Identity::Key(key));
        }
        None
    }

    /// The `id` field parsed as a number, used for identity-ordered walking
    pub fn numeric_id(&self) -> Option<u64> {
        match self.get("id")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The `key` field, if present
    pub fn key(&self) -> Option<&str> {
        self.get("key").and_then(Value::as_str)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Page
// ============================================================================

/// One page of search results, normalized from the wire response.
///
/// `total_reported` is a hint, not a contract: servers return stale or zero
/// totals, so strategies verify completeness independently.
#[derive(Debug, Clone)]
pub struct Page {
    /// Records on this page
    pub records: Vec<Record>,
    /// Server-reported total matching the query (untrusted)
    pub total_reported: u64,
    /// Server's claim that this is the last page
    pub is_last: bool,
    /// Opaque cursor for the next page, preferred over numeric offset
    pub next_cursor: Option<String>,
}

impl Page {
    /// A page with no records
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            total_reported: 0,
            is_last: true,
            next_cursor: None,
        }
    }

    /// Number of records on this page
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the page carries no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolved identities of the first `n` records, in page order.
    ///
    /// Unidentifiable records are skipped; used to compare page prefixes
    /// when probing for offset-ignoring servers.
    pub fn leading_identities(&self, n: usize) -> Vec<Identity> {
        self.records
            .iter()
            .filter_map(Record::identity)
            .take(n)
            .collect()
    }

    /// Maximum parseable numeric `id` on this page
    pub fn max_numeric_id(&self) -> Option<u64> {
        self.records.iter().filter_map(Record::numeric_id).max()
    }
}

// ============================================================================
// Page Cursor
// ============================================================================

/// Position of the next page request: numeric offset or opaque server token.
///
/// The two are mutually exclusive on the wire (`startAt` vs `nextPageToken`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// Numeric `startAt` offset
    Offset(u64),
    /// Opaque `nextPageToken` issued by the server
    Token(String),
}

impl PageCursor {
    /// Cursor for the first page
    pub fn start() -> Self {
        Self::Offset(0)
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation flag.
///
/// Strategies check it between page iterations; the parallel fan-out checks
/// it between task completions. Cancelling never loses accumulated records.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(std::sync::atomic::Ordering::Relaxed)
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Progress callback: `(fetched, total_estimate)`.
///
/// `fetched` is monotonically non-decreasing and never exceeds the final
/// result size; `total_estimate` is advisory and may change between calls.
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Invokes an optional progress callback
#[derive(Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    /// Wrap an optional callback
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    /// A reporter that drops every report
    pub fn disabled() -> Self {
        Self { callback: None }
    }

    /// Report progress
    pub fn report(&self, fetched: u64, total_estimate: u64) {
        if let Some(callback) = &self.callback {
            callback(fetched, total_estimate);
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}
