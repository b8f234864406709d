//! Half-open time-of-day intervals in minute-of-day units.

use crate::error::QueryError;

/// `[start_min, end_min)` in minutes since midnight, `0 <= start < end <= 1440`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_min: u16,
    pub end_min: u16,
}

impl TimeWindow {
    pub fn new(start_min: u16, end_min: u16) -> Result<Self, QueryError> {
        if start_min >= end_min || end_min > 1440 {
            return Err(QueryError::InvalidInput(format!(
                "invalid time window [{start_min}, {end_min})"
            )));
        }
        Ok(Self { start_min, end_min })
    }

    /// Inclusive start, exclusive end.
    pub fn contains(&self, minute: u16) -> bool {
        self.start_min <= minute && minute < self.end_min
    }

    /// Parses `"HH:MM-HH:MM"`.
    pub fn parse(s: &str) -> Result<Self, QueryError> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| QueryError::InvalidInput(format!("invalid window '{s}'")))?;
        Self::new(parse_clock(start)?, parse_clock(end)?)
    }
}

/// Parses `"HH:MM"` into a minute-of-day.
pub fn parse_clock(s: &str) -> Result<u16, QueryError> {
    let invalid = || QueryError::InvalidInput(format!("invalid clock time '{s}'"));
    let (h, m) = s.split_once(':').ok_or_else(invalid)?;
    let hour: u16 = h.parse().map_err(|_| invalid())?;
    let minute: u16 = m.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok(hour * 60 + minute)
}
