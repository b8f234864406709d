//! Static per-corner operating schedules.
//!
//! Loaded once at startup from the catalog and immutable thereafter, so the
//! engine can read it from any number of concurrent requests without locking.

use crate::catalog::CornerKey;
use crate::schedule::day::ServiceDay;
use crate::schedule::window::TimeWindow;
use std::collections::HashMap;

/// Operating windows and break windows for one corner, keyed by day type.
/// Windows within a list are non-overlapping and ordered.
#[derive(Debug, Clone, Default)]
pub struct CornerSchedule {
    pub weekday: Vec<TimeWindow>,
    pub saturday: Vec<TimeWindow>,
    /// Sundays and holidays serve only when this list is non-empty.
    pub sunday: Vec<TimeWindow>,
    /// Closed intervals inside an operating window, per day type.
    pub breaks: HashMap<ServiceDay, Vec<TimeWindow>>,
    /// When set, the corner is active only if menu data exists for the date.
    pub requires_menu_data: bool,
}

impl CornerSchedule {
    pub fn operating_windows(&self, day: ServiceDay) -> &[TimeWindow] {
        match day {
            ServiceDay::Weekday => &self.weekday,
            ServiceDay::Saturday => &self.saturday,
            ServiceDay::Sunday | ServiceDay::Holiday => &self.sunday,
        }
    }

    pub fn break_windows(&self, day: ServiceDay) -> &[TimeWindow] {
        self.breaks.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// All corner schedules, keyed by the composite (restaurant, corner)
/// identity rather than nested string maps.
#[derive(Debug, Clone, Default)]
pub struct ScheduleBook {
    entries: HashMap<CornerKey, CornerSchedule>,
}

impl ScheduleBook {
    pub fn insert(&mut self, key: CornerKey, schedule: CornerSchedule) {
        self.entries.insert(key, schedule);
    }

    pub fn get(&self, key: &CornerKey) -> Option<&CornerSchedule> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
