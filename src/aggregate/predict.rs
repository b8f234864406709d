//! Day-of-week historical prediction.
//!
//! For a target weekday and 5-minute bucket, gathers the same bucket from
//! the last few occurrences of that weekday and averages in two stages:
//! per-day-per-corner first, then across days. The two-stage mean is
//! intentional so a day with many samples cannot dominate a day with few;
//! do not collapse it into a flat mean over all raw samples.

use crate::aggregate::fanout::{CornerOutcome, Fanout, Job};
use crate::catalog::CornerKey;
use crate::clock::date_kst;
use crate::error::QueryError;
use crate::resolve::TimeBucket;
use crate::store::QueryOptions;
use crate::wait::WaitModel;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const DEFAULT_LOOKBACK_WEEKS: usize = 4;

/// Graded from the number of lookback days that actually yielded data,
/// not days attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    None,
}

impl Confidence {
    pub fn from_days(based_on_days: usize) -> Self {
        match based_on_days {
            d if d >= 4 => Confidence::High,
            d if d >= 2 => Confidence::Medium,
            d if d >= 1 => Confidence::Low,
            _ => Confidence::None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionRow {
    pub restaurant_id: String,
    pub corner_id: String,
    pub avg_queue_len: f64,
    pub wait_minutes: u32,
    pub based_on_days: usize,
    pub sample_size: usize,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub predictions: Vec<PredictionRow>,
    pub based_on_days: usize,
    pub sample_size: usize,
    pub confidence: Confidence,
}

/// The last `count` occurrences of `target` strictly before `today`,
/// most recent first.
pub fn lookback_dates(today: NaiveDate, target: Weekday, count: usize) -> Vec<NaiveDate> {
    let mut date = today - Duration::days(1);
    while date.weekday() != target {
        date -= Duration::days(1);
    }
    (0..count)
        .map(|week| date - Duration::days(7 * week as i64))
        .collect()
}

/// Parses a 0-6 day-of-week index (0 = Sunday, 6 = Saturday).
pub fn parse_day_of_week(index: u8) -> Result<Weekday, QueryError> {
    match index {
        0 => Ok(Weekday::Sun),
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        other => Err(QueryError::InvalidInput(format!(
            "day of week must be 0-6, got {other}"
        ))),
    }
}

/// Bucket-scoped parallel queries across (lookback date x corner), reusing
/// the fan-out primitive. Corners with zero samples across all days are
/// omitted entirely.
pub async fn predict(
    fanout: &Fanout,
    wait: &WaitModel,
    today: NaiveDate,
    target: Weekday,
    minute_of_day: u16,
    lookback_weeks: usize,
) -> Result<Prediction, QueryError> {
    let bucket = TimeBucket::from_minute(minute_of_day);
    let dates = lookback_dates(today, target, lookback_weeks);

    let mut jobs = Vec::with_capacity(dates.len() * fanout.corners().len());
    for &date in &dates {
        for key in fanout.corners() {
            jobs.push(Job {
                key: key.clone(),
                range: bucket.range_on(date),
            });
        }
    }

    let (outcomes, _) = fanout.run(jobs, QueryOptions::default()).await?;

    // (corner, date) -> (sum of queue lengths, sample count)
    let mut samples: HashMap<CornerKey, BTreeMap<NaiveDate, (f64, usize)>> = HashMap::new();
    for (job, outcome) in outcomes {
        if let CornerOutcome::Data(rows) = outcome {
            let date = date_kst(job.range.start_ms);
            let entry = samples
                .entry(job.key)
                .or_default()
                .entry(date)
                .or_insert((0.0, 0));
            for row in &rows {
                entry.0 += f64::from(row.queue_length);
                entry.1 += 1;
            }
        }
    }

    let mut days_with_data: HashSet<NaiveDate> = HashSet::new();
    let mut total_samples = 0;
    let mut predictions = Vec::with_capacity(samples.len());

    let mut keyed: Vec<(CornerKey, BTreeMap<NaiveDate, (f64, usize)>)> =
        samples.into_iter().collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    for (key, by_date) in keyed {
        // Stage one: one average per day, so every day weighs equally.
        let daily_means: Vec<f64> = by_date
            .values()
            .filter(|(_, count)| *count > 0)
            .map(|(sum, count)| sum / *count as f64)
            .collect();
        if daily_means.is_empty() {
            continue;
        }
        // Stage two: mean of the daily means.
        let avg_queue_len = daily_means.iter().sum::<f64>() / daily_means.len() as f64;

        let corner_days = by_date.len();
        let corner_samples: usize = by_date.values().map(|(_, count)| count).sum();
        days_with_data.extend(by_date.keys());
        total_samples += corner_samples;

        let wait_minutes = wait.wait_minutes(&key, avg_queue_len)?;
        predictions.push(PredictionRow {
            restaurant_id: key.restaurant_id,
            corner_id: key.corner_id,
            avg_queue_len,
            wait_minutes,
            based_on_days: corner_days,
            sample_size: corner_samples,
            confidence: Confidence::from_days(corner_days),
        });
    }

    let based_on_days = days_with_data.len();
    Ok(Prediction {
        predictions,
        based_on_days,
        sample_size: total_samples,
        confidence: Confidence::from_days(based_on_days),
    })
}
