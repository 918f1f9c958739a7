//! Order detection and order-preserving insertion points
//!
//! The detector scans a fixed list of candidate orderings, keys outermost
//! (name, area, population) and descending before ascending within a key,
//! and reports the first one the collection already satisfies.
//!
//! Collections with fewer than two records have no adjacent pairs, so every
//! candidate matches vacuously and the detector reports the first candidate,
//! `(Name, Descending)`.

use crate::compare::{compare, SortDirection, SortKey};
use crate::record::Record;
use itertools::{iproduct, Itertools};
use std::cmp::Ordering;

/// A (key, direction) pair the collection satisfies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedOrder {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl DetectedOrder {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }
}

impl std::fmt::Display for DetectedOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "by {} in {}", self.key, self.direction)
    }
}

/// Check that no adjacent pair is out of order under (key, direction)
pub fn is_sorted_by(records: &[Record], key: SortKey, direction: SortDirection) -> bool {
    records
        .iter()
        .tuple_windows()
        .all(|(prev, next)| compare(prev, next, key, direction) != Ordering::Greater)
}

/// First candidate ordering the records already satisfy, if any
pub fn detect_order(records: &[Record]) -> Option<DetectedOrder> {
    iproduct!(SortKey::ALL, SortDirection::ALL)
        .find(|&(key, direction)| is_sorted_by(records, key, direction))
        .map(|(key, direction)| DetectedOrder::new(key, direction))
}

/// Direction in which the records are already ordered by `key`, descending first
pub fn detect_order_by_key(records: &[Record], key: SortKey) -> Option<DetectedOrder> {
    SortDirection::ALL
        .into_iter()
        .find(|&direction| is_sorted_by(records, key, direction))
        .map(|direction| DetectedOrder::new(key, direction))
}

/// Index at which `candidate` keeps `records` ordered by (key, direction).
///
/// Returns the position of the first record the candidate must precede, or
/// `records.len()` to append. Candidates equal to existing records land after
/// them. `records` must already be ordered by (key, direction); otherwise the
/// result is some index in `0..=len` with no ordering guarantee.
pub fn locate_insertion(
    records: &[Record],
    candidate: &Record,
    key: SortKey,
    direction: SortDirection,
) -> usize {
    records
        .iter()
        .position(|existing| compare(existing, candidate, key, direction) == Ordering::Greater)
        .unwrap_or(records.len())
}
