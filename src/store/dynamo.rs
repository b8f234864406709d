//! Live time-series store backed by DynamoDB.
//!
//! Thin wrapper around a long-lived `aws_sdk_dynamodb::Client` built once
//! from the ambient AWS config; never reconstructed per request. Items:
//! `pk = CORNER#{restaurant}#{corner}`, `sk = {epoch_ms:013}`, plus
//! `queue_length`, optional `wait_minutes`, `data_kind`, `source`.

use super::{DataKind, QueryOptions, QueueSnapshot, TimeRange, TimeSeriesStore, sort_key};
use crate::error::StoreError;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use std::collections::HashMap;

// DynamoDB caps BatchWriteItem at 25 requests.
const BATCH_WRITE_CHUNK: usize = 25;

pub struct DynamoStore {
    client: aws_sdk_dynamodb::Client,
    table: String,
}

impl DynamoStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl TimeSeriesStore for DynamoStore {
    async fn query(
        &self,
        partition_key: &str,
        range: TimeRange,
        opts: QueryOptions,
    ) -> Result<Vec<QueueSnapshot>, StoreError> {
        let mut request = self
            .client
            .query()
            .table_name(&self.table)
            .key_condition_expression("#pk = :pk AND #sk BETWEEN :start AND :end")
            .expression_attribute_names("#pk", "pk")
            .expression_attribute_names("#sk", "sk")
            .expression_attribute_values(":pk", AttributeValue::S(partition_key.to_string()))
            .expression_attribute_values(":start", AttributeValue::S(sort_key(range.start_ms)))
            .expression_attribute_values(":end", AttributeValue::S(sort_key(range.end_ms)))
            .scan_index_forward(!opts.descending);
        if let Some(limit) = opts.limit {
            request = request.limit(limit as i32);
        }

        let output = request
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(parse_item)
            .collect()
    }

    async fn put(&self, records: &[QueueSnapshot]) -> Result<(), StoreError> {
        for chunk in records.chunks(BATCH_WRITE_CHUNK) {
            let writes = chunk
                .iter()
                .map(|record| {
                    let put = PutRequest::builder()
                        .set_item(Some(to_item(record)))
                        .build()
                        .map_err(|e| StoreError::BadRecord(e.to_string()))?;
                    Ok(WriteRequest::builder().put_request(put).build())
                })
                .collect::<Result<Vec<_>, StoreError>>()?;

            self.client
                .batch_write_item()
                .request_items(&self.table, writes)
                .send()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }
}

fn to_item(record: &QueueSnapshot) -> HashMap<String, AttributeValue> {
    let pk = format!("CORNER#{}#{}", record.restaurant_id, record.corner_id);
    let mut item = HashMap::from([
        ("pk".to_string(), AttributeValue::S(pk)),
        ("sk".to_string(), AttributeValue::S(sort_key(record.timestamp_ms))),
        (
            "queue_length".to_string(),
            AttributeValue::N(record.queue_length.to_string()),
        ),
        ("data_kind".to_string(), AttributeValue::S(kind_str(record.data_kind).to_string())),
        ("source".to_string(), AttributeValue::S(record.source.clone())),
    ]);
    if let Some(wait) = record.wait_minutes {
        item.insert("wait_minutes".to_string(), AttributeValue::N(wait.to_string()));
    }
    item
}

fn parse_item(item: HashMap<String, AttributeValue>) -> Result<QueueSnapshot, StoreError> {
    let string_attr = |name: &str| -> Result<String, StoreError> {
        item.get(name)
            .and_then(|v| v.as_s().ok())
            .cloned()
            .ok_or_else(|| StoreError::BadRecord(format!("missing string attribute '{name}'")))
    };

    let pk = string_attr("pk")?;
    let mut parts = pk.splitn(3, '#');
    let (_, restaurant_id, corner_id) = match (parts.next(), parts.next(), parts.next()) {
        (Some("CORNER"), Some(r), Some(c)) => ("CORNER", r.to_string(), c.to_string()),
        _ => return Err(StoreError::BadRecord(format!("bad partition key '{pk}'"))),
    };

    let timestamp_ms: i64 = string_attr("sk")?
        .parse()
        .map_err(|_| StoreError::BadRecord("non-numeric sort key".into()))?;

    let number_attr = |name: &str| -> Option<u32> {
        item.get(name)
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse().ok())
    };

    let queue_length = number_attr("queue_length")
        .ok_or_else(|| StoreError::BadRecord("missing queue_length".into()))?;

    let data_kind = match string_attr("data_kind")?.as_str() {
        "observed" => DataKind::Observed,
        "predicted" => DataKind::Predicted,
        "archived" => DataKind::Archived,
        other => return Err(StoreError::BadRecord(format!("unknown data kind '{other}'"))),
    };

    Ok(QueueSnapshot {
        restaurant_id,
        corner_id,
        timestamp_ms,
        queue_length,
        wait_minutes: number_attr("wait_minutes"),
        data_kind,
        source: string_attr("source")?,
    })
}

fn kind_str(kind: DataKind) -> &'static str {
    match kind {
        DataKind::Observed => "observed",
        DataKind::Predicted => "predicted",
        DataKind::Archived => "archived",
    }
}
