//! Core data types shared by the planner, queries, sinks and aggregators

use crate::config::FetchMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One document of a collection
///
/// Documents are opaque: they are never inspected, only concatenated and
/// re-serialized in the order the service returned them.
pub type Document = serde_json::Value;

/// A single page request: `limit` records starting at `offset`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageDescriptor {
    /// Maximum number of records in the page (always positive)
    pub limit: u64,
    /// Index of the first record of the page
    pub offset: u64,
}

impl PageDescriptor {
    /// Exclusive end of the record range this page asks for
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.limit)
    }
}

/// One page of documents as returned by a page query
///
/// Deserializes directly from the search endpoint's response body. Extra
/// fields the service includes (such as `queryTime`) are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// Documents of this page, in the collection's sort order
    #[serde(default)]
    pub documents: Vec<Document>,
    /// Total number of records in the collection
    ///
    /// Only the first page's value is used.
    pub total: u64,
}

/// Outcome of one complete fetch
#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct FetchSummary {
    /// Mode the collection was fetched with
    pub mode: FetchMode,
    /// Total reported by the service on the first page
    pub total: u64,
    /// Number of documents written to the sink
    pub records: usize,
    /// Number of page queries issued, including the first
    pub pages: usize,
    /// Wall-clock time from the first query to the closed sink
    pub elapsed: Duration,
}

impl FetchSummary {
    /// Render the closing summary line, e.g. `Saved 5 records in 12ms.`
    pub fn line(&self, verb: &str) -> String {
        format!(
            "{verb} {} records in {}ms.",
            self.records,
            self.elapsed.as_millis()
        )
    }
}
