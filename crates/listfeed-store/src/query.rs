//! Record queries: a filter plus an ordered list of sort descriptors
//!
//! Result order is fully determined by the sort descriptors. When every
//! descriptor ties, records are ordered by id, so a query never returns the
//! same record set in two different orders.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use listfeed_core::{FeedError, Result, Timestamp};
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Record fields a query can sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Creation timestamp
    Timestamp,
    /// Label text; unlabelled records sort first
    Label,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Timestamp => f.write_str("timestamp"),
            SortKey::Label => f.write_str("label"),
        }
    }
}

/// One sort criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDescriptor {
    /// Field to compare
    pub key: SortKey,
    /// Ascending when true
    pub ascending: bool,
}

impl SortDescriptor {
    /// Ascending by `key`.
    pub fn ascending(key: SortKey) -> Self {
        Self {
            key,
            ascending: true,
        }
    }

    /// Descending by `key`.
    pub fn descending(key: SortKey) -> Self {
        Self {
            key,
            ascending: false,
        }
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ord = match self.key {
            SortKey::Timestamp => a.timestamp.cmp(&b.timestamp),
            SortKey::Label => a.label.cmp(&b.label),
        };
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

/// Parses `timestamp`, `timestamp:asc`, `label:desc`.
impl FromStr for SortDescriptor {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self> {
        let (key, direction) = s.split_once(':').unwrap_or((s, "asc"));
        let key = match key.trim() {
            "timestamp" => SortKey::Timestamp,
            "label" => SortKey::Label,
            "" => return Err(FeedError::invalid_query("empty sort key")),
            other => {
                return Err(FeedError::invalid_query(format!("unknown sort key '{other}'")))
            }
        };
        let ascending = match direction.trim() {
            "asc" => true,
            "desc" => false,
            other => {
                return Err(FeedError::invalid_query(format!(
                    "unknown sort direction '{other}'"
                )))
            }
        };
        Ok(Self { key, ascending })
    }
}

/// Which records a query admits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Inclusive lower bound on timestamp
    pub since: Option<Timestamp>,
    /// Exclusive upper bound on timestamp
    pub before: Option<Timestamp>,
    /// Required substring of the label
    pub label_contains: Option<String>,
}

impl RecordFilter {
    /// Admit every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether `record` passes the filter.
    pub fn matches(&self, record: &Record) -> bool {
        self.since.map_or(true, |since| record.timestamp >= since)
            && self.before.map_or(true, |before| record.timestamp < before)
            && self.label_contains.as_ref().map_or(true, |needle| {
                record
                    .label
                    .as_deref()
                    .is_some_and(|label| label.contains(needle.as_str()))
            })
    }
}

/// Filter and sort order evaluated against the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
    /// Admission filter
    pub filter: RecordFilter,
    /// Sort descriptors, most significant first
    pub sort: Vec<SortDescriptor>,
}

impl RecordQuery {
    /// Query with the given sort and no filter.
    pub fn sorted_by(sort: Vec<SortDescriptor>) -> Self {
        Self {
            filter: RecordFilter::all(),
            sort,
        }
    }

    /// Every record, oldest first.
    pub fn by_timestamp() -> Self {
        Self::sorted_by(vec![SortDescriptor::ascending(SortKey::Timestamp)])
    }

    /// Replace the filter.
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Reject queries that cannot produce a deterministic result.
    pub fn validate(&self) -> Result<()> {
        if self.sort.is_empty() {
            return Err(FeedError::invalid_query(
                "query needs at least one sort descriptor",
            ));
        }
        let mut seen = HashSet::new();
        for descriptor in &self.sort {
            if !seen.insert(descriptor.key) {
                return Err(FeedError::invalid_query(format!(
                    "sort key '{}' listed twice",
                    descriptor.key
                )));
            }
        }
        if let (Some(since), Some(before)) = (self.filter.since, self.filter.before) {
            if since >= before {
                return Err(FeedError::invalid_query(format!(
                    "empty time range: since {since} is not before {before}"
                )));
            }
        }
        Ok(())
    }

    /// Whether a record belongs in the result set.
    pub fn admits(&self, record: &Record) -> bool {
        self.filter.matches(record)
    }

    /// Compare two records by the sort descriptors, then by id.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.sort
            .iter()
            .map(|d| d.compare(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }

    /// Filter and sort records.
    pub fn evaluate<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> Vec<Record> {
        let mut result: Vec<Record> = records
            .into_iter()
            .filter(|r| self.admits(r))
            .cloned()
            .collect();
        result.sort_by(|a, b| self.compare(a, b));
        result
    }
}
