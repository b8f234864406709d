//! In-memory store for tests and local runs, with failure injection so the
//! fan-out's partial-failure and unavailable paths can be exercised.

use super::{QueryOptions, QueueSnapshot, TimeRange, TimeSeriesStore};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<String, Vec<QueueSnapshot>>>,
    failing: RwLock<HashSet<String>>,
    down: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<QueueSnapshot>) -> Self {
        let store = Self::new();
        store.load(records);
        store
    }

    pub fn load(&self, records: Vec<QueueSnapshot>) {
        let mut rows = self.rows.write().expect("memory store lock poisoned");
        for record in records {
            let pk = format!("CORNER#{}#{}", record.restaurant_id, record.corner_id);
            rows.entry(pk).or_default().push(record);
        }
        for series in rows.values_mut() {
            series.sort_by_key(|r| r.timestamp_ms);
        }
    }

    /// Makes every query against `partition_key` fail.
    pub fn fail_partition(&self, partition_key: &str) {
        self.failing
            .write()
            .expect("memory store lock poisoned")
            .insert(partition_key.to_string());
    }

    /// Makes the whole store unreachable.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn query(
        &self,
        partition_key: &str,
        range: TimeRange,
        opts: QueryOptions,
    ) -> Result<Vec<QueueSnapshot>, StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is down".into()));
        }
        if self
            .failing
            .read()
            .expect("memory store lock poisoned")
            .contains(partition_key)
        {
            return Err(StoreError::Unavailable(format!(
                "injected failure for {partition_key}"
            )));
        }

        let rows = self.rows.read().expect("memory store lock poisoned");
        let mut matched: Vec<QueueSnapshot> = rows
            .get(partition_key)
            .map(|series| {
                series
                    .iter()
                    .filter(|r| range.start_ms <= r.timestamp_ms && r.timestamp_ms <= range.end_ms)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if opts.descending {
            matched.reverse();
        }
        if let Some(limit) = opts.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn put(&self, records: &[QueueSnapshot]) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is down".into()));
        }
        self.load(records.to_vec());
        Ok(())
    }
}
