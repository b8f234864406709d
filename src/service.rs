//! The single query surface over both stores.
//!
//! Combines the source router, fan-out aggregator, time-bucket resolver,
//! schedule engine, and wait model. Everything above this layer sees either
//! a result set (possibly partial or empty) or one of the two hard failure
//! kinds, `InvalidInput` and `SourceUnavailable`.

use crate::aggregate::fanout::{CornerOutcome, DayLatest, Fanout, Job};
use crate::aggregate::predict::{self, DEFAULT_LOOKBACK_WEEKS, Prediction, parse_day_of_week};
use crate::catalog::{Catalog, CornerKey};
use crate::clock::Clock;
use crate::error::QueryError;
use crate::menu::MenuOracle;
use crate::resolve::{
    Requested, TimeBucket, latest, nearest_by_clock, nearest_by_millis, parse_requested,
};
use crate::router::{Source, SourceRouter};
use crate::schedule::day::{HolidayCalendar, parse_date_key};
use crate::schedule::engine::{CornerStatus, sort_active_first, statuses};
use crate::schedule::window::parse_clock;
use crate::store::{DataKind, QueryOptions, QueueSnapshot, TimeSeriesStore};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct QueryService {
    catalog: Arc<Catalog>,
    live: Fanout,
    archive: Fanout,
    router: SourceRouter,
    clock: Arc<dyn Clock>,
    menu: Arc<dyn MenuOracle>,
    holidays: Arc<dyn HolidayCalendar>,
}

impl QueryService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<Catalog>,
        live_store: Arc<dyn TimeSeriesStore>,
        archive_store: Arc<dyn TimeSeriesStore>,
        clock: Arc<dyn Clock>,
        menu: Arc<dyn MenuOracle>,
        holidays: Arc<dyn HolidayCalendar>,
        router: SourceRouter,
    ) -> Self {
        let corners = catalog.corner_keys();
        Self {
            live: Fanout::new(live_store, corners.clone()),
            archive: Fanout::new(archive_store, corners),
            catalog,
            router,
            clock,
            menu,
            holidays,
        }
    }

    fn route(&self, date: NaiveDate) -> Result<(Source, &Fanout), QueryError> {
        match self.router.route(date, self.clock.today()) {
            Source::Live => {
                self.router.check_live()?;
                Ok((Source::Live, &self.live))
            }
            Source::Archive => Ok((Source::Archive, &self.archive)),
        }
    }

    /// Most recent snapshot for the date. On LIVE routes, data older than
    /// the staleness threshold becomes an empty result, never "old but
    /// valid" rows.
    pub async fn latest_for_date(&self, date_key: &str) -> Result<DayLatest, QueryError> {
        let date = parse_date_key(date_key)?;
        let (source, fanout) = self.route(date)?;
        let mut result = fanout.latest_for_date(date).await?;

        if source == Source::Live
            && let Some(ts) = result.latest_ms
            && self.router.is_stale(ts, self.clock.now_utc())
        {
            info!(latest_ms = ts, "live data is stale, returning no data");
            return Ok(DayLatest {
                rows: Vec::new(),
                latest_ms: None,
                summary: result.summary,
            });
        }

        self.fill_wait(&mut result.rows)?;
        Ok(result)
    }

    /// Every snapshot recorded on the date.
    pub async fn all_for_date(&self, date_key: &str) -> Result<Vec<QueueSnapshot>, QueryError> {
        let date = parse_date_key(date_key)?;
        let (_, fanout) = self.route(date)?;
        let (mut rows, _) = fanout.all_for_date(date).await?;
        self.fill_wait(&mut rows)?;
        Ok(rows)
    }

    /// Sorted distinct observation timestamps on the date.
    pub async fn timestamps_for_date(&self, date_key: &str) -> Result<Vec<i64>, QueryError> {
        let date = parse_date_key(date_key)?;
        let (_, fanout) = self.route(date)?;
        fanout.timestamps_for_date(date).await
    }

    /// Snapshots representing the requested instant, with wait minutes
    /// filled in. Today resolves to the nearest available observation;
    /// other dates resolve clock-time requests to a 5-minute bucket average
    /// per corner.
    pub async fn wait_at(
        &self,
        date_key: &str,
        requested: Option<&str>,
    ) -> Result<Vec<QueueSnapshot>, QueryError> {
        let date = parse_date_key(date_key)?;
        let requested = parse_requested(requested)?;
        let (source, fanout) = self.route(date)?;

        let resolved = match (source, requested) {
            (Source::Archive, Requested::Clock { minute_of_day }) => {
                return self.bucket_average(fanout, date, minute_of_day).await;
            }
            (_, Requested::Exact(ms)) => {
                nearest_by_millis(ms, &fanout.timestamps_for_date(date).await?)
            }
            (_, Requested::Clock { minute_of_day }) => {
                nearest_by_clock(minute_of_day, &fanout.timestamps_for_date(date).await?)
            }
            (_, Requested::Latest) => {
                let resolved = latest(&fanout.timestamps_for_date(date).await?);
                // Latest-wins is a "now" view; stale live data degrades to
                // no data. Explicit instants are not staleness filtered.
                if source == Source::Live
                    && let Some(ts) = resolved
                    && self.router.is_stale(ts, self.clock.now_utc())
                {
                    info!(latest_ms = ts, "live data is stale, returning no data");
                    return Ok(Vec::new());
                }
                resolved
            }
        };

        let Some(resolved_ms) = resolved else {
            return Ok(Vec::new()); // no data, not an error
        };

        let (rows, _) = fanout.all_for_date(date).await?;
        let mut rows: Vec<QueueSnapshot> = rows
            .into_iter()
            .filter(|r| r.timestamp_ms == resolved_ms)
            .collect();
        self.fill_wait(&mut rows)?;
        Ok(rows)
    }

    /// One synthesized row per corner: the average queue length of all
    /// samples inside the requested 5-minute bucket.
    async fn bucket_average(
        &self,
        fanout: &Fanout,
        date: NaiveDate,
        minute_of_day: u16,
    ) -> Result<Vec<QueueSnapshot>, QueryError> {
        let bucket = TimeBucket::from_minute(minute_of_day);
        let range = bucket.range_on(date);
        let jobs: Vec<Job> = fanout
            .corners()
            .iter()
            .map(|key| Job { key: key.clone(), range })
            .collect();
        let (outcomes, _) = fanout.run(jobs, QueryOptions::default()).await?;

        let mut rows = Vec::new();
        for (job, outcome) in outcomes {
            let CornerOutcome::Data(samples) = outcome else {
                continue;
            };
            let avg = samples.iter().map(|r| f64::from(r.queue_length)).sum::<f64>()
                / samples.len() as f64;
            let wait = self.catalog.wait_model().wait_minutes(&job.key, avg)?;
            rows.push(QueueSnapshot {
                restaurant_id: job.key.restaurant_id,
                corner_id: job.key.corner_id,
                timestamp_ms: range.start_ms,
                queue_length: avg.round() as u32,
                wait_minutes: Some(wait),
                data_kind: DataKind::Archived,
                source: "bucket-average".into(),
            });
        }
        rows.sort_by(|a, b| {
            (&a.restaurant_id, &a.corner_id).cmp(&(&b.restaurant_id, &b.corner_id))
        });
        Ok(rows)
    }

    /// Active/inactive status for every corner of a restaurant, active
    /// first. An unknown restaurant yields an empty list; a failing menu
    /// lookup degrades to "no menu" rather than failing the batch.
    pub async fn statuses_for(
        &self,
        restaurant_id: &str,
        date_key: &str,
        time_hhmm: &str,
    ) -> Result<Vec<CornerStatus>, QueryError> {
        let date = parse_date_key(date_key)?;
        let minute = parse_clock(time_hhmm)?;
        let Some(corners) = self.catalog.corners_of(restaurant_id) else {
            return Ok(Vec::new());
        };

        let mut menu_present = HashMap::new();
        for corner_id in corners {
            let key = CornerKey::new(restaurant_id, corner_id);
            let needs_menu = self
                .catalog
                .schedules()
                .get(&key)
                .is_some_and(|s| s.requires_menu_data);
            if !needs_menu {
                continue;
            }
            match self.menu.has_menu(restaurant_id, corner_id, date).await {
                Ok(present) => {
                    menu_present.insert(corner_id.clone(), present);
                }
                Err(err) => {
                    warn!(error = %err, corner_id, "menu lookup failed, treating as no menu");
                }
            }
        }

        let result = statuses(
            self.catalog.schedules(),
            restaurant_id,
            corners,
            date,
            minute,
            self.holidays.as_ref(),
            &menu_present,
        );
        Ok(sort_active_first(result))
    }

    /// Historical prediction for a weekday and time of day. Lookback dates
    /// are always in the past, so this reads the archive.
    pub async fn predict(&self, day_of_week: u8, time_hhmm: &str) -> Result<Prediction, QueryError> {
        let target = parse_day_of_week(day_of_week)?;
        let minute = parse_clock(time_hhmm)?;
        predict::predict(
            &self.archive,
            self.catalog.wait_model(),
            self.clock.today(),
            target,
            minute,
            DEFAULT_LOOKBACK_WEEKS,
        )
        .await
    }

    fn fill_wait(&self, rows: &mut [QueueSnapshot]) -> Result<(), QueryError> {
        for row in rows {
            if row.wait_minutes.is_none() {
                let key = CornerKey::new(&row.restaurant_id, &row.corner_id);
                row.wait_minutes = Some(
                    self.catalog
                        .wait_model()
                        .wait_minutes(&key, f64::from(row.queue_length))?,
                );
            }
        }
        Ok(())
    }
}
