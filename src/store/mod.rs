//! Generic key/value persistence contract.
//!
//! The scan core never depends on a concrete storage technology; everything
//! goes through this trait over five logical tables. Rows and filters are
//! JSON objects, filters match by top-level equality.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Apis,
    Endpoints,
    Scans,
    ScanResults,
    ScheduledScans,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Apis => "apis",
            Table::Endpoints => "endpoints",
            Table::Scans => "scans",
            Table::ScanResults => "scan_results",
            Table::ScheduledScans => "scheduled_scans",
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert one row, or every element when `row` is an array (bulk insert).
    async fn insert(&self, table: Table, row: Value) -> Result<Value>;

    /// Rows whose top-level fields all equal the filter's fields.
    /// An empty filter object selects the whole table.
    async fn select(&self, table: Table, filters: Value) -> Result<Vec<Value>>;

    /// Merge `patch` into every matching row. Returns the rows after the
    /// patch; an empty return means nothing matched, which is how callers
    /// express compare-and-swap writes (filter on the previous value).
    async fn update(&self, table: Table, patch: Value, filters: Value) -> Result<Vec<Value>>;

    /// Remove matching rows, returning them.
    async fn delete(&self, table: Table, filters: Value) -> Result<Vec<Value>>;

    /// Insert, or replace the row whose `conflict_key` field matches.
    async fn upsert(&self, table: Table, row: Value, conflict_key: &str) -> Result<Value>;
}

/// Top-level equality match used by store implementations.
pub(crate) fn row_matches(row: &Value, filters: &Value) -> bool {
    match filters.as_object() {
        Some(map) => map.iter().all(|(k, v)| row.get(k) == Some(v)),
        None => true,
    }
}
