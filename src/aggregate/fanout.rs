//! Parallel per-corner fan-out against a time-series store.
//!
//! Every (restaurant, corner) pair gets its own bounded-concurrency query
//! with its own timeout. One slow or broken corner never blocks or kills
//! the others: failures are logged, counted, and omitted from the merge.
//! Only all queries failing surfaces as `SourceUnavailable`.

use crate::catalog::CornerKey;
use crate::error::QueryError;
use crate::store::{QueryOptions, QueueSnapshot, TimeRange, TimeSeriesStore, day_range_kst};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, warn};

pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// One unit of fan-out work: a corner and the time range to ask it about.
#[derive(Debug, Clone)]
pub struct Job {
    pub key: CornerKey,
    pub range: TimeRange,
}

/// Per-sub-query result. Empty and failed are distinct: empty is a valid
/// answer, failed is omitted data.
#[derive(Debug, Clone)]
pub enum CornerOutcome {
    Data(Vec<QueueSnapshot>),
    Empty,
    Failed,
}

/// Observability summary of one fan-out round; never raised as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FanoutSummary {
    pub attempted: usize,
    pub failed: usize,
}

/// `latest_for_date` result: only rows at the canonical maximum timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct DayLatest {
    pub rows: Vec<QueueSnapshot>,
    pub latest_ms: Option<i64>,
    pub summary: FanoutSummary,
}

pub struct Fanout {
    store: Arc<dyn TimeSeriesStore>,
    corners: Vec<CornerKey>,
    concurrency: usize,
    query_timeout: Duration,
}

impl Fanout {
    pub fn new(store: Arc<dyn TimeSeriesStore>, corners: Vec<CornerKey>) -> Self {
        Self {
            store,
            corners,
            concurrency: DEFAULT_CONCURRENCY,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_limits(mut self, concurrency: usize, query_timeout: Duration) -> Self {
        self.concurrency = concurrency.max(1);
        self.query_timeout = query_timeout;
        self
    }

    pub fn corners(&self) -> &[CornerKey] {
        &self.corners
    }

    fn day_jobs(&self, date: NaiveDate) -> Vec<Job> {
        let range = day_range_kst(date);
        self.corners
            .iter()
            .map(|key| Job { key: key.clone(), range })
            .collect()
    }

    /// Issues every job concurrently and collects one outcome per job.
    /// Merge logic downstream must be commutative over completion order;
    /// outcomes are returned in job order regardless of which finished
    /// first.
    pub async fn run(
        &self,
        jobs: Vec<Job>,
        opts: QueryOptions,
    ) -> Result<(Vec<(Job, CornerOutcome)>, FanoutSummary), QueryError> {
        let attempted = jobs.len();
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(attempted);

        for job in jobs {
            let sem = Arc::clone(&semaphore);
            let store = Arc::clone(&self.store);
            let opts = opts.clone();
            let timeout = self.query_timeout;

            let span = tracing::info_span!(
                "corner_query",
                restaurant_id = %job.key.restaurant_id,
                corner_id = %job.key.corner_id,
            );
            handles.push(tokio::spawn(
                async move {
                    let _permit = sem.acquire().await.unwrap();
                    let outcome = query_once(store.as_ref(), &job, &opts, timeout).await;
                    (job, outcome)
                }
                .instrument(span),
            ));
        }

        let mut outcomes = Vec::with_capacity(attempted);
        let mut failed = 0;
        for handle in handles {
            match handle.await {
                Ok((job, outcome)) => {
                    if matches!(outcome, CornerOutcome::Failed) {
                        failed += 1;
                    }
                    outcomes.push((job, outcome));
                }
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, "corner query task panicked");
                }
            }
        }

        if attempted > 0 && failed == attempted {
            return Err(QueryError::SourceUnavailable(format!(
                "all {attempted} corner queries failed"
            )));
        }
        if failed > 0 {
            warn!(failed, attempted, "partial fan-out failure, omitting failed corners");
        }
        Ok((outcomes, FanoutSummary { attempted, failed }))
    }

    /// The most recent snapshot of the day. Each corner contributes at most
    /// one row (limit 1, descending); the canonical latest is the maximum
    /// timestamp across corners, and only rows at that instant are kept.
    /// Corners without data at that instant are silently excluded; partial
    /// snapshots are valid and expected.
    #[tracing::instrument(skip(self), fields(date = %date))]
    pub async fn latest_for_date(&self, date: NaiveDate) -> Result<DayLatest, QueryError> {
        let opts = QueryOptions {
            limit: Some(1),
            descending: true,
        };
        let (outcomes, summary) = self.run(self.day_jobs(date), opts).await?;

        let mut latest_ms: Option<i64> = None;
        for (_, outcome) in &outcomes {
            if let CornerOutcome::Data(rows) = outcome {
                for row in rows {
                    latest_ms = Some(latest_ms.map_or(row.timestamp_ms, |m| m.max(row.timestamp_ms)));
                }
            }
        }

        let rows = match latest_ms {
            Some(max) => {
                let mut rows: Vec<QueueSnapshot> = outcomes
                    .into_iter()
                    .filter_map(|(_, outcome)| match outcome {
                        CornerOutcome::Data(rows) => Some(rows),
                        _ => None,
                    })
                    .flatten()
                    .filter(|row| row.timestamp_ms == max)
                    .collect();
                rows.sort_by(|a, b| {
                    (&a.restaurant_id, &a.corner_id).cmp(&(&b.restaurant_id, &b.corner_id))
                });
                rows
            }
            None => Vec::new(),
        };

        Ok(DayLatest { rows, latest_ms, summary })
    }

    /// Every snapshot of the day across all corners, timestamp-ordered.
    #[tracing::instrument(skip(self), fields(date = %date))]
    pub async fn all_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<(Vec<QueueSnapshot>, FanoutSummary), QueryError> {
        let (outcomes, summary) = self.run(self.day_jobs(date), QueryOptions::default()).await?;
        let mut rows: Vec<QueueSnapshot> = outcomes
            .into_iter()
            .filter_map(|(_, outcome)| match outcome {
                CornerOutcome::Data(rows) => Some(rows),
                _ => None,
            })
            .flatten()
            .collect();
        rows.sort_by(|a, b| {
            (a.timestamp_ms, &a.restaurant_id, &a.corner_id)
                .cmp(&(b.timestamp_ms, &b.restaurant_id, &b.corner_id))
        });
        Ok((rows, summary))
    }

    /// Sorted distinct observation timestamps of the day.
    pub async fn timestamps_for_date(&self, date: NaiveDate) -> Result<Vec<i64>, QueryError> {
        let (rows, _) = self.all_for_date(date).await?;
        let mut timestamps: Vec<i64> = rows.into_iter().map(|r| r.timestamp_ms).collect();
        timestamps.sort_unstable();
        timestamps.dedup();
        Ok(timestamps)
    }
}

async fn query_once(
    store: &dyn TimeSeriesStore,
    job: &Job,
    opts: &QueryOptions,
    timeout: Duration,
) -> CornerOutcome {
    let pk = job.key.partition_key();
    match tokio::time::timeout(timeout, store.query(&pk, job.range, opts.clone())).await {
        Ok(Ok(rows)) if rows.is_empty() => CornerOutcome::Empty,
        Ok(Ok(rows)) => CornerOutcome::Data(rows),
        Ok(Err(err)) => {
            warn!(partition = %pk, error = %err, "corner query failed");
            CornerOutcome::Failed
        }
        Err(_) => {
            warn!(partition = %pk, timeout_ms = timeout.as_millis() as u64, "corner query timed out");
            CornerOutcome::Failed
        }
    }
}
