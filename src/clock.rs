//! Server-authoritative clock and KST calendar helpers.
//!
//! "Today" is always the server's notion of today in KST, never the
//! client's, so midnight rollovers are observed promptly and client
//! timezone drift cannot cause wrong-day reads.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// KST is a fixed UTC+9 offset, no DST.
pub const KST_UTC_OFFSET_SECS: i64 = 9 * 3600;

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// The server's current calendar date in KST.
    fn today(&self) -> NaiveDate {
        (self.now_utc() + Duration::seconds(KST_UTC_OFFSET_SECS)).date_naive()
    }
}

/// Wall-clock implementation used in production.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed-instant clock for tests.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Epoch milliseconds of `minute_of_day` on `date`, interpreted in KST.
pub fn kst_ms(date: NaiveDate, minute_of_day: u16) -> i64 {
    let midnight_utc_ms =
        date.and_time(NaiveTime::MIN).and_utc().timestamp_millis() - KST_UTC_OFFSET_SECS * 1000;
    midnight_utc_ms + i64::from(minute_of_day) * 60_000
}

/// Minute-of-day [0, 1440) of an epoch-millisecond timestamp in KST.
pub fn minute_of_day_kst(ts_ms: i64) -> u16 {
    let minutes = ts_ms.div_euclid(60_000) + KST_UTC_OFFSET_SECS / 60;
    minutes.rem_euclid(1440) as u16
}

/// The KST calendar date containing an epoch-millisecond timestamp.
pub fn date_kst(ts_ms: i64) -> NaiveDate {
    DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| (dt + Duration::seconds(KST_UTC_OFFSET_SECS)).date_naive())
        .unwrap_or_default()
}
