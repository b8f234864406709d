//! Resolves a requested instant to a stored timestamp or 5-minute bucket.
//!
//! Nearest-match ties resolve to the first-encountered candidate in input
//! order; callers rely on that for output stability.

use crate::clock::{kst_ms, minute_of_day_kst};
use crate::error::QueryError;
use crate::schedule::window::parse_clock;
use crate::store::TimeRange;
use chrono::{DateTime, NaiveDate};

pub const BUCKET_MINUTES: u16 = 5;

/// A 5-minute-aligned `[start, start+5)` window in minute-of-day units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBucket {
    pub start_min: u16,
}

impl TimeBucket {
    pub fn from_minute(minute_of_day: u16) -> Self {
        Self {
            start_min: minute_of_day / BUCKET_MINUTES * BUCKET_MINUTES,
        }
    }

    /// The bucket's inclusive epoch-millisecond range on `date` (KST).
    pub fn range_on(&self, date: NaiveDate) -> TimeRange {
        let start_ms = kst_ms(date, self.start_min);
        TimeRange {
            start_ms,
            end_ms: start_ms + i64::from(BUCKET_MINUTES) * 60_000 - 1,
        }
    }
}

/// A caller's notion of "when".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requested {
    /// Exact instant, epoch milliseconds.
    Exact(i64),
    /// Time of day; resolved against today's observations or an archival
    /// 5-minute bucket depending on the route.
    Clock { minute_of_day: u16 },
    /// Most recent available observation.
    Latest,
}

/// Parses an optional request string: RFC 3339 → exact, `HH:MM` → clock
/// time, absent → latest.
pub fn parse_requested(raw: Option<&str>) -> Result<Requested, QueryError> {
    let Some(raw) = raw else {
        return Ok(Requested::Latest);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Requested::Exact(dt.timestamp_millis()));
    }
    if let Ok(minute) = parse_clock(raw) {
        return Ok(Requested::Clock { minute_of_day: minute });
    }
    Err(QueryError::InvalidInput(format!(
        "expected an RFC 3339 timestamp or HH:MM, got '{raw}'"
    )))
}

/// Exact match if present, else nearest by absolute millisecond difference.
/// Empty input yields `None` ("no data").
pub fn nearest_by_millis(target_ms: i64, available: &[i64]) -> Option<i64> {
    if available.contains(&target_ms) {
        return Some(target_ms);
    }
    let mut best: Option<(i64, i64)> = None; // (distance, timestamp)
    for &ts in available {
        let distance = (ts - target_ms).abs();
        // Strict comparison keeps the first-encountered candidate on ties.
        if best.is_none_or(|(d, _)| distance < d) {
            best = Some((distance, ts));
        }
    }
    best.map(|(_, ts)| ts)
}

/// Nearest available timestamp by KST minute-of-day distance, same
/// first-encountered tie rule. Used for "today" clock-time requests.
pub fn nearest_by_clock(minute_of_day: u16, available: &[i64]) -> Option<i64> {
    let target = i32::from(minute_of_day);
    let mut best: Option<(i32, i64)> = None;
    for &ts in available {
        let distance = (i32::from(minute_of_day_kst(ts)) - target).abs();
        if best.is_none_or(|(d, _)| distance < d) {
            best = Some((distance, ts));
        }
    }
    best.map(|(_, ts)| ts)
}

/// Latest-wins default when no instant was requested.
pub fn latest(available: &[i64]) -> Option<i64> {
    available.iter().copied().max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn buckets_align_to_five_minutes() {
        assert_eq!(TimeBucket::from_minute(0).start_min, 0);
        assert_eq!(TimeBucket::from_minute(604).start_min, 600);
        assert_eq!(TimeBucket::from_minute(605).start_min, 605);
        assert_eq!(TimeBucket::from_minute(1439).start_min, 1435);
    }

    #[test]
    fn bucket_range_spans_five_minutes_inclusive() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let range = TimeBucket::from_minute(600).range_on(date);
        assert_eq!(range.end_ms - range.start_ms, 5 * 60_000 - 1);
        assert_eq!(minute_of_day_kst(range.start_ms), 600);
    }

    #[test]
    fn parses_request_variants() {
        assert_eq!(parse_requested(None).unwrap(), Requested::Latest);
        assert_eq!(
            parse_requested(Some("12:45")).unwrap(),
            Requested::Clock { minute_of_day: 765 }
        );
        assert!(matches!(
            parse_requested(Some("2024-03-04T12:45:00+09:00")).unwrap(),
            Requested::Exact(_)
        ));
        assert!(matches!(
            parse_requested(Some("noonish")),
            Err(QueryError::InvalidInput(_))
        ));
    }

    #[test]
    fn exact_timestamp_is_used_verbatim() {
        assert_eq!(nearest_by_millis(20, &[10, 20, 30]), Some(20));
    }

    #[test]
    fn nearest_by_millis_minimizes_distance() {
        assert_eq!(nearest_by_millis(24, &[10, 20, 30]), Some(20));
        assert_eq!(nearest_by_millis(26, &[10, 20, 30]), Some(30));
    }

    #[test]
    fn ties_keep_the_first_encountered_candidate() {
        assert_eq!(nearest_by_millis(25, &[30, 20, 10]), Some(30));
        assert_eq!(nearest_by_millis(25, &[20, 30, 10]), Some(20));
    }

    #[test]
    fn empty_availability_is_no_data() {
        assert_eq!(nearest_by_millis(25, &[]), None);
        assert_eq!(nearest_by_clock(600, &[]), None);
        assert_eq!(latest(&[]), None);
    }

    #[test]
    fn nearest_by_clock_uses_minute_of_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let at = |hhmm: u16| kst_ms(date, hhmm);
        let available = [at(600), at(610), at(620)]; // 10:00, 10:10, 10:20

        assert_eq!(nearest_by_clock(604, &available), Some(at(600))); // 10:04
        assert_eq!(nearest_by_clock(606, &available), Some(at(610))); // 10:06
        // Exact tie at 10:05 keeps the first-encountered 10:00.
        assert_eq!(nearest_by_clock(605, &available), Some(at(600)));
    }

    #[test]
    fn latest_wins_when_nothing_requested() {
        assert_eq!(latest(&[10, 30, 20]), Some(30));
    }
}
