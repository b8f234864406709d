//! Abstract time-series store and the queue-snapshot record shape.

mod dynamo;
mod memory;
mod s3;

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;
pub use s3::S3ArchiveStore;

use crate::clock::kst_ms;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Provenance of a queue observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Observed,
    Predicted,
    Archived,
}

/// One queue-length observation for one corner. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub restaurant_id: String,
    pub corner_id: String,
    pub timestamp_ms: i64,
    pub queue_length: u32,
    /// Stored directly by newer store generations; derived via the wait
    /// model when absent.
    pub wait_minutes: Option<u32>,
    pub data_kind: DataKind,
    pub source: String,
}

/// Inclusive epoch-millisecond range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub limit: Option<usize>,
    pub descending: bool,
}

/// Time-keyed record store. Implementations return records ordered by
/// timestamp (descending when requested) and honor `limit` after ordering.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    async fn query(
        &self,
        partition_key: &str,
        range: TimeRange,
        opts: QueryOptions,
    ) -> Result<Vec<QueueSnapshot>, StoreError>;

    /// Used only by the ingestion path.
    async fn put(&self, records: &[QueueSnapshot]) -> Result<(), StoreError>;
}

/// The KST calendar-day boundary `[00:00:00.000, 23:59:59.999]` of `date`,
/// in the store's native epoch-millisecond representation.
pub fn day_range_kst(date: NaiveDate) -> TimeRange {
    let start_ms = kst_ms(date, 0);
    TimeRange {
        start_ms,
        end_ms: start_ms + 86_400_000 - 1,
    }
}

/// Sort keys are zero-padded so lexicographic order equals numeric order.
pub fn sort_key(ts_ms: i64) -> String {
    format!("{ts_ms:013}")
}
