//! Record deduplication
//!
//! Every strategy funnels its pages through the same accumulator, so
//! duplicate handling lives in exactly one place. Identity-less records are
//! kept verbatim and never deduplicated against anything.

use crate::types::{Identity, Record};
use std::collections::HashSet;

/// Deduplicate a collection of records by resolved identity.
///
/// First occurrence wins; identity-less records are preserved verbatim.
/// Runs in `O(n)` over a set of seen identities.
pub fn dedup_records(records: Vec<Record>) -> Vec<Record> {
    let mut acc = DedupAccumulator::new();
    acc.extend(records);
    acc.into_records()
}

/// Incrementally accumulates records, dropping identity duplicates.
///
/// Owned by the single task finalizing a strategy's output; never shared
/// across concurrent workers.
#[derive(Debug, Default)]
pub struct DedupAccumulator {
    records: Vec<Record>,
    seen: HashSet<Identity>,
}

impl DedupAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records accumulated so far
    pub fn len(&self) -> u64 {
        self.records.len() as u64
    }

    /// Whether nothing has been accumulated
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether this identity has already been accumulated
    pub fn contains(&self, identity: &Identity) -> bool {
        self.seen.contains(identity)
    }

    /// Push a single record. Returns `true` if it was kept.
    pub fn push(&mut self, record: Record) -> bool {
        match record.identity() {
            Some(identity) => {
                if self.seen.insert(identity) {
                    self.records.push(record);
                    true
                } else {
                    false
                }
            }
            // Unidentifiable records are always kept
            None => {
                self.records.push(record);
                true
            }
        }
    }

    /// Push a batch of records, returning how many were kept
    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) -> u64 {
        let mut added = 0;
        for record in records {
            if self.push(record) {
                added += 1;
            }
        }
        added
    }

    /// Whether every identifiable record in the slice is already
    /// accumulated.
    ///
    /// Returns `false` when the slice carries no identifiable records at
    /// all; a page of unknowns says nothing about server progress.
    pub fn all_seen(&self, records: &[Record]) -> bool {
        let mut identified = 0;
        for record in records {
            if let Some(identity) = record.identity() {
                identified += 1;
                if !self.seen.contains(&identity) {
                    return false;
                }
            }
        }
        identified > 0
    }

    /// Consume the accumulator, returning the deduplicated records
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
