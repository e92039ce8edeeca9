//! JQL string helpers
//!
//! Small transformations the strategies apply to the caller's filter
//! expression: forcing an ascending identity ordering, adding an `id > N`
//! floor for offset-free walking, and the untrusted-total heuristic.

use once_cell::sync::Lazy;
use regex::Regex;

static ORDER_BY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\border\s+by\b.*$").expect("valid regex"));

/// Remove any trailing `ORDER BY` clause from a JQL expression
pub fn strip_order_by(jql: &str) -> String {
    ORDER_BY_RE.replace(jql, "").trim().to_string()
}

/// Force an ascending identity ordering, replacing any existing `ORDER BY`.
///
/// Identity-ordered walking requires this exact ordering; a caller-supplied
/// clause would break the `id > N` floor invariant.
pub fn with_identity_order(jql: &str) -> String {
    let base = strip_order_by(jql);
    if base.is_empty() {
        "ORDER BY id ASC".to_string()
    } else {
        format!("{base} ORDER BY id ASC")
    }
}

/// Constrain a JQL expression to identities strictly greater than `floor`,
/// ordered ascending by identity.
///
/// The original filter is parenthesized so its own boolean structure cannot
/// leak into the added conjunct.
pub fn with_id_floor(jql: &str, floor: u64) -> String {
    let base = strip_order_by(jql);
    if base.is_empty() {
        format!("id > {floor} ORDER BY id ASC")
    } else {
        format!("({base}) AND id > {floor} ORDER BY id ASC")
    }
}

/// Whether a server-reported total looks like a truncated placeholder.
///
/// Some servers report round-number totals (exact multiples of e.g. 100 or
/// 1000) when the real count is unknown. The multiples are configuration,
/// not load-bearing constants; a hit only triggers an advisory cross-check.
pub fn is_suspicious_total(total: u64, multiples: &[u64]) -> bool {
    total > 0 && multiples.iter().any(|m| *m > 0 && total % m == 0)
}
