//! Record comparison under a sort key and direction

use crate::error::StoreError;
use crate::record::Record;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Field a collection is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Byte-wise lexicographic order of names
    Name,
    Area,
    Population,
}

impl SortKey {
    /// Every key, in detection order
    pub const ALL: [SortKey; 3] = [SortKey::Name, SortKey::Area, SortKey::Population];
}

/// Direction of an ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Descending,
    Ascending,
}

impl SortDirection {
    /// Every direction, in detection order (descending is tried first)
    pub const ALL: [SortDirection; 2] = [SortDirection::Descending, SortDirection::Ascending];
}

/// Compare two records. `Less` means `a` belongs before `b` under (key, direction).
#[inline]
pub fn compare(a: &Record, b: &Record, key: SortKey, direction: SortDirection) -> Ordering {
    let cmp = match key {
        SortKey::Name => a.name().as_bytes().cmp(b.name().as_bytes()),
        // Records only hold finite areas, so partial_cmp is total here
        SortKey::Area => a.area().partial_cmp(&b.area()).unwrap_or(Ordering::Equal),
        SortKey::Population => a.population().cmp(&b.population()),
    };

    match direction {
        SortDirection::Ascending => cmp,
        SortDirection::Descending => cmp.reverse(),
    }
}

impl FromStr for SortKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" | "n" => Ok(SortKey::Name),
            "area" | "a" => Ok(SortKey::Area),
            "population" | "p" => Ok(SortKey::Population),
            _ => Err(StoreError::invalid_config(&format!("unknown sort key: {s}"))),
        }
    }
}

impl FromStr for SortDirection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            _ => Err(StoreError::invalid_config(&format!(
                "unknown sort direction: {s}"
            ))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortKey::Name => "name",
            SortKey::Area => "area",
            SortKey::Population => "population",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortDirection::Descending => "descending order",
            SortDirection::Ascending => "ascending order",
        };
        write!(f, "{name}")
    }
}
