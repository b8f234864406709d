//! End-to-end tests of the query surface against the in-memory store.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use cornerq::aggregate::Confidence;
use cornerq::catalog::Catalog;
use cornerq::clock::{FixedClock, kst_ms};
use cornerq::error::QueryError;
use cornerq::menu::StaticMenuOracle;
use cornerq::router::SourceRouter;
use cornerq::schedule::NoHolidays;
use cornerq::service::QueryService;
use cornerq::store::{DataKind, MemoryStore, QueueSnapshot};
use std::sync::Arc;

// Keeps the shipped catalog honest: tests run against the same file.
const CATALOG_JSON: &str = include_str!("../config/catalog.json");

// 2024-03-04 is a Monday.
const TODAY: &str = "2024-03-04";

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn at(day: &str, minute: u16) -> i64 {
    kst_ms(date(day), minute)
}

fn clock_at(day: &str, minute: u16) -> Arc<FixedClock> {
    Arc::new(FixedClock(
        DateTime::<Utc>::from_timestamp_millis(at(day, minute)).unwrap(),
    ))
}

fn snap(corner: &str, ts: i64, queue: u32) -> QueueSnapshot {
    QueueSnapshot {
        restaurant_id: "student-hall".into(),
        corner_id: corner.into(),
        timestamp_ms: ts,
        queue_length: queue,
        wait_minutes: None,
        data_kind: DataKind::Observed,
        source: "test".into(),
    }
}

struct Harness {
    live: Arc<MemoryStore>,
    archive: Arc<MemoryStore>,
}

impl Harness {
    fn new() -> Self {
        Self {
            live: Arc::new(MemoryStore::new()),
            archive: Arc::new(MemoryStore::new()),
        }
    }

    fn service(&self, clock: Arc<FixedClock>, router: SourceRouter) -> QueryService {
        QueryService::new(
            Arc::new(Catalog::from_json(CATALOG_JSON).unwrap()),
            self.live.clone(),
            self.archive.clone(),
            clock,
            Arc::new(StaticMenuOracle::all_present()),
            Arc::new(NoHolidays),
            router,
        )
    }
}

#[tokio::test]
async fn latest_today_keeps_only_rows_at_the_max_timestamp() {
    let harness = Harness::new();
    let t_old = at(TODAY, 12 * 60);
    let t_new = at(TODAY, 12 * 60 + 4);
    harness.live.load(vec![
        snap("western", t_old, 3),
        snap("western", t_new, 4),
        snap("ramen", t_new, 6),
        snap("snack", t_old, 9), // lagging corner, excluded
    ]);
    // One minute after the newest observation: fresh.
    let service = harness.service(clock_at(TODAY, 12 * 60 + 5), SourceRouter::default());

    let result = service.latest_for_date(TODAY).await.unwrap();
    assert_eq!(result.latest_ms, Some(t_new));
    let ids: Vec<&str> = result.rows.iter().map(|r| r.corner_id.as_str()).collect();
    assert_eq!(ids, ["ramen", "western"]);
    // Wait minutes are derived when the stored record lacks them:
    // western has rate 2.0, overhead 1 -> ceil(4/2 + 1) = 3.
    let western = result.rows.iter().find(|r| r.corner_id == "western").unwrap();
    assert_eq!(western.wait_minutes, Some(3));
}

#[tokio::test]
async fn stale_live_data_is_no_data_not_old_rows() {
    let harness = Harness::new();
    harness.live.load(vec![snap("western", at(TODAY, 12 * 60), 4)]);
    // Five minutes later, past the 90-second threshold.
    let service = harness.service(clock_at(TODAY, 12 * 60 + 5), SourceRouter::default());

    let result = service.latest_for_date(TODAY).await.unwrap();
    assert!(result.rows.is_empty());
    assert_eq!(result.latest_ms, None);
}

#[tokio::test]
async fn disabled_live_store_is_unavailable_never_archive() {
    let harness = Harness::new();
    harness.live.load(vec![snap("western", at(TODAY, 12 * 60), 4)]);
    // Same data also present in the archive; it must not be used.
    harness.archive.load(vec![snap("western", at(TODAY, 12 * 60), 4)]);
    let router = SourceRouter::new(false, Duration::seconds(90));
    let service = harness.service(clock_at(TODAY, 12 * 60 + 1), router);

    let result = service.latest_for_date(TODAY).await;
    assert!(matches!(result, Err(QueryError::SourceUnavailable(_))));
}

#[tokio::test]
async fn past_dates_read_the_archive_without_staleness_filtering() {
    let harness = Harness::new();
    let past = "2024-02-26";
    harness.archive.load(vec![snap("western", at(past, 12 * 60), 5)]);
    let service = harness.service(clock_at(TODAY, 12 * 60), SourceRouter::default());

    let result = service.latest_for_date(past).await.unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].queue_length, 5);
}

#[tokio::test]
async fn one_failing_corner_shrinks_the_result_instead_of_failing() {
    let harness = Harness::new();
    let t = at(TODAY, 12 * 60 + 4);
    harness.live.load(vec![snap("western", t, 4), snap("ramen", t, 6)]);
    harness.live.fail_partition("CORNER#student-hall#ramen");
    let service = harness.service(clock_at(TODAY, 12 * 60 + 5), SourceRouter::default());

    let result = service.latest_for_date(TODAY).await.unwrap();
    assert_eq!(result.summary.failed, 1);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].corner_id, "western");
}

#[tokio::test]
async fn every_store_failure_surfaces_as_source_unavailable() {
    let harness = Harness::new();
    harness.live.set_down(true);
    let service = harness.service(clock_at(TODAY, 12 * 60), SourceRouter::default());

    let result = service.latest_for_date(TODAY).await;
    assert!(matches!(result, Err(QueryError::SourceUnavailable(_))));
}

#[tokio::test]
async fn wait_at_today_resolves_to_the_nearest_observation() {
    let harness = Harness::new();
    harness.live.load(vec![
        snap("western", at(TODAY, 600), 2), // 10:00
        snap("western", at(TODAY, 610), 4), // 10:10
        snap("western", at(TODAY, 620), 8), // 10:20
    ]);
    let service = harness.service(clock_at(TODAY, 621), SourceRouter::default());

    let rows = service.wait_at(TODAY, Some("10:04")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp_ms, at(TODAY, 600));

    let rows = service.wait_at(TODAY, Some("10:06")).await.unwrap();
    assert_eq!(rows[0].timestamp_ms, at(TODAY, 610));

    // No request means latest-wins.
    let rows = service.wait_at(TODAY, None).await.unwrap();
    assert_eq!(rows[0].timestamp_ms, at(TODAY, 620));
}

#[tokio::test]
async fn wait_at_latest_wins_applies_the_staleness_rule() {
    let harness = Harness::new();
    harness.live.load(vec![snap("western", at(TODAY, 12 * 60), 4)]);
    // Five minutes later, past the 90-second threshold.
    let service = harness.service(clock_at(TODAY, 12 * 60 + 5), SourceRouter::default());

    // No requested instant is a "now" view: stale live data is no data.
    assert!(service.wait_at(TODAY, None).await.unwrap().is_empty());

    // An explicit instant still resolves to the old observation.
    let rows = service.wait_at(TODAY, Some("12:00")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp_ms, at(TODAY, 12 * 60));
}

#[tokio::test]
async fn wait_at_archive_clock_requests_average_the_bucket() {
    let harness = Harness::new();
    let past = "2024-02-26";
    // Two samples inside the 12:00 bucket, one outside it.
    harness.archive.load(vec![
        snap("western", at(past, 720), 4),
        snap("western", at(past, 722), 6),
        snap("western", at(past, 726), 40),
    ]);
    let service = harness.service(clock_at(TODAY, 12 * 60), SourceRouter::default());

    let rows = service.wait_at(past, Some("12:03")).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.queue_length, 5); // mean of 4 and 6
    assert_eq!(row.data_kind, DataKind::Archived);
    // ceil(5/2.0 + 1.0) = 4 with western's parameters.
    assert_eq!(row.wait_minutes, Some(4));
    assert_eq!(row.timestamp_ms, at(past, 720));
}

#[tokio::test]
async fn empty_ranges_are_no_data_not_errors() {
    let harness = Harness::new();
    let service = harness.service(clock_at(TODAY, 12 * 60), SourceRouter::default());

    assert!(service.wait_at(TODAY, Some("10:00")).await.unwrap().is_empty());
    assert!(service.all_for_date(TODAY).await.unwrap().is_empty());
    assert!(service.timestamps_for_date(TODAY).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_inputs_are_invalid_input() {
    let harness = Harness::new();
    let service = harness.service(clock_at(TODAY, 12 * 60), SourceRouter::default());

    assert!(matches!(
        service.latest_for_date("03/04/2024").await,
        Err(QueryError::InvalidInput(_))
    ));
    assert!(matches!(
        service.wait_at(TODAY, Some("noonish")).await,
        Err(QueryError::InvalidInput(_))
    ));
    assert!(matches!(
        service.predict(7, "12:00").await,
        Err(QueryError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn predict_uses_the_mean_of_daily_means() {
    let harness = Harness::new();
    // Today is Wednesday 2024-03-06; the four prior Mondays are 03-04,
    // 02-26, 02-19 and 02-12. Data lands on three of them.
    let clock = clock_at("2024-03-06", 12 * 60);
    harness.archive.load(vec![
        snap("western", at("2024-02-26", 720), 2),
        snap("western", at("2024-02-26", 723), 4), // daily mean 3
        snap("western", at("2024-02-19", 721), 10), // daily mean 10
        snap("western", at("2024-02-12", 724), 2), // daily mean 2
    ]);
    let service = harness.service(clock, SourceRouter::default());

    let prediction = service.predict(1, "12:02").await.unwrap();
    assert_eq!(prediction.based_on_days, 3);
    assert_eq!(prediction.sample_size, 4);
    assert_eq!(prediction.confidence, Confidence::Medium);

    // Corners with no samples are omitted entirely.
    assert_eq!(prediction.predictions.len(), 1);
    let row = &prediction.predictions[0];
    assert_eq!(row.corner_id, "western");
    // Mean of daily means (3 + 10 + 2) / 3 = 5, not the flat mean 4.5.
    assert!((row.avg_queue_len - 5.0).abs() < 1e-9);
    // ceil(5/2.0 + 1.0) = 4 with western's parameters.
    assert_eq!(row.wait_minutes, 4);
    assert_eq!(row.based_on_days, 3);
    assert_eq!(row.sample_size, 4);
    assert_eq!(row.confidence, Confidence::Medium);
}

#[tokio::test]
async fn statuses_honor_windows_breaks_and_ordering() {
    let harness = Harness::new();
    let service = harness.service(clock_at(TODAY, 12 * 60), SourceRouter::default());

    // 12:15 on a weekday: western [11:00,14:30) outside its break, ramen
    // [11:00,14:00), snack [10:00,18:00) all active.
    let result = service.statuses_for("student-hall", TODAY, "12:15").await.unwrap();
    assert!(result.iter().all(|s| s.is_active));

    // 12:45 falls in western's break; active corners come first, both
    // sides keeping their input order.
    let result = service.statuses_for("student-hall", TODAY, "12:45").await.unwrap();
    let ids: Vec<&str> = result.iter().map(|s| s.corner_id.as_str()).collect();
    assert_eq!(ids, ["ramen", "snack", "western"]);
    assert!(!result[2].is_active);

    // 15:00 is outside western's and ramen's windows and inside snack's
    // weekday break.
    let result = service.statuses_for("student-hall", TODAY, "15:00").await.unwrap();
    assert!(result.iter().all(|s| !s.is_active));

    // Unknown restaurants degrade to an empty list, not an error.
    let result = service.statuses_for("no-such-hall", TODAY, "12:00").await.unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn corners_needing_menu_data_stay_inactive_without_it() {
    let harness = Harness::new();
    // Oracle with no menus at all: western and set-menu require them.
    let service = QueryService::new(
        Arc::new(Catalog::from_json(CATALOG_JSON).unwrap()),
        harness.live.clone(),
        harness.archive.clone(),
        clock_at(TODAY, 12 * 60),
        Arc::new(StaticMenuOracle::default()),
        Arc::new(NoHolidays),
        SourceRouter::default(),
    );

    let result = service.statuses_for("student-hall", TODAY, "12:15").await.unwrap();
    let western = result.iter().find(|s| s.corner_id == "western").unwrap();
    assert!(!western.is_active);
    let ramen = result.iter().find(|s| s.corner_id == "ramen").unwrap();
    assert!(ramen.is_active);
}

#[tokio::test]
async fn sundays_without_windows_are_fully_inactive() {
    let harness = Harness::new();
    let service = harness.service(clock_at(TODAY, 12 * 60), SourceRouter::default());

    // 2024-03-10 is a Sunday. Only snack declares Sunday windows.
    let result = service.statuses_for("student-hall", "2024-03-10", "12:00").await.unwrap();
    let actives: Vec<&str> = result
        .iter()
        .filter(|s| s.is_active)
        .map(|s| s.corner_id.as_str())
        .collect();
    assert_eq!(actives, ["snack"]);
}
