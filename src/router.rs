//! Routes a requested date to the live or archival store.
//!
//! Strict single-source-of-truth policy: "today" (by the server's KST
//! clock) reads exclusively from the live store, every other date
//! exclusively from the archive. A disabled live store degrades to
//! unavailable rather than silently falling back to the archive.

use crate::error::QueryError;
use chrono::{DateTime, Duration, NaiveDate, Utc};

pub const DEFAULT_STALE_AFTER_SECS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Live,
    Archive,
}

#[derive(Debug, Clone, Copy)]
pub struct SourceRouter {
    live_enabled: bool,
    stale_after: Duration,
}

impl Default for SourceRouter {
    fn default() -> Self {
        Self {
            live_enabled: true,
            stale_after: Duration::seconds(DEFAULT_STALE_AFTER_SECS),
        }
    }
}

impl SourceRouter {
    pub fn new(live_enabled: bool, stale_after: Duration) -> Self {
        Self {
            live_enabled,
            stale_after,
        }
    }

    /// Today routes LIVE; any other date, past or future, routes ARCHIVE.
    pub fn route(&self, date: NaiveDate, today: NaiveDate) -> Source {
        if date == today { Source::Live } else { Source::Archive }
    }

    /// A LIVE route with the live store disabled is unavailable, never an
    /// archive read.
    pub fn check_live(&self) -> Result<(), QueryError> {
        if self.live_enabled {
            Ok(())
        } else {
            Err(QueryError::SourceUnavailable(
                "live store is disabled".into(),
            ))
        }
    }

    /// Live data older than the threshold is treated as no data, so callers
    /// render a neutral empty state instead of stale congestion numbers.
    pub fn is_stale(&self, latest_ms: i64, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() - latest_ms > self.stale_after.num_milliseconds()
    }
}
