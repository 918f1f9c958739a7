//! Stable reordering of record collections

use crate::compare::{compare, SortDirection, SortKey};
use crate::record::Record;

/// Sort records in place. Stable: records that compare equal keep their
/// original relative order.
pub fn sort_records(records: &mut [Record], key: SortKey, direction: SortDirection) {
    // slice::sort_by is a stable merge sort
    records.sort_by(|a, b| compare(a, b, key, direction));
}

/// Owned variant of [`sort_records`]
pub fn sorted(mut records: Vec<Record>, key: SortKey, direction: SortDirection) -> Vec<Record> {
    sort_records(&mut records, key, direction);
    records
}
