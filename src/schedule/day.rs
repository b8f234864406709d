//! Service-day classification.

use crate::error::QueryError;
use chrono::{Datelike, NaiveDate, Weekday};

/// Which operating-window set applies on a calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceDay {
    Weekday,
    Saturday,
    Sunday,
    Holiday,
}

/// Abstraction over a holiday data source so the classifier's control flow
/// never changes when a real calendar is wired in.
pub trait HolidayCalendar: Send + Sync {
    fn is_holiday(&self, date: NaiveDate) -> bool;
}

/// Permanent stub: no holiday calendar is currently supplied, so every date
/// classifies as a regular day. Swap in a real source via the trait.
pub struct NoHolidays;

impl HolidayCalendar for NoHolidays {
    fn is_holiday(&self, _date: NaiveDate) -> bool {
        false
    }
}

/// Holiday lookup first, then day-of-week.
pub fn classify(date: NaiveDate, holidays: &dyn HolidayCalendar) -> ServiceDay {
    if holidays.is_holiday(date) {
        return ServiceDay::Holiday;
    }
    match date.weekday() {
        Weekday::Sun => ServiceDay::Sunday,
        Weekday::Sat => ServiceDay::Saturday,
        _ => ServiceDay::Weekday,
    }
}

/// Parses a `"YYYY-MM-DD"` date key.
pub fn parse_date_key(s: &str) -> Result<NaiveDate, QueryError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| QueryError::InvalidInput(format!("invalid date key '{s}'")))
}
