//! Archival time-series store backed by S3.
//!
//! One JSON object per corner per KST day, keyed
//! `{partition_key}/date={YYYY-MM-DD}.json`. A missing object is "no data",
//! not an error; only an unreachable bucket is unavailable.

use super::{QueryOptions, QueueSnapshot, TimeRange, TimeSeriesStore};
use crate::clock::date_kst;
use crate::error::StoreError;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::HashMap;

pub struct S3ArchiveStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ArchiveStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn object_key(partition_key: &str, date: chrono::NaiveDate) -> String {
        format!("{partition_key}/date={}.json", date.format("%Y-%m-%d"))
    }
}

#[async_trait]
impl TimeSeriesStore for S3ArchiveStore {
    async fn query(
        &self,
        partition_key: &str,
        range: TimeRange,
        opts: QueryOptions,
    ) -> Result<Vec<QueueSnapshot>, StoreError> {
        // Callers scope ranges within a single KST day.
        let key = Self::object_key(partition_key, date_kst(range.start_ms));

        let body = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(resp) => resp
                .body
                .collect()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?
                .into_bytes(),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(Vec::new());
                }
                return Err(StoreError::Unavailable(service_err.to_string()));
            }
        };

        let mut rows: Vec<QueueSnapshot> =
            serde_json::from_slice(&body).map_err(|e| StoreError::BadRecord(e.to_string()))?;
        rows.retain(|r| range.start_ms <= r.timestamp_ms && r.timestamp_ms <= range.end_ms);
        rows.sort_by_key(|r| r.timestamp_ms);

        if opts.descending {
            rows.reverse();
        }
        if let Some(limit) = opts.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn put(&self, records: &[QueueSnapshot]) -> Result<(), StoreError> {
        let mut grouped: HashMap<String, Vec<QueueSnapshot>> = HashMap::new();
        for record in records {
            let pk = format!("CORNER#{}#{}", record.restaurant_id, record.corner_id);
            let key = Self::object_key(&pk, date_kst(record.timestamp_ms));
            grouped.entry(key).or_default().push(record.clone());
        }

        for (key, mut rows) in grouped {
            rows.sort_by_key(|r| r.timestamp_ms);
            let body =
                serde_json::to_vec(&rows).map_err(|e| StoreError::BadRecord(e.to_string()))?;
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(ByteStream::from(body))
                .send()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }
}
