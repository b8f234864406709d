//! Decides whether corners are serving at a given instant.
//!
//! Every code path yields a boolean; missing configuration degrades to
//! "inactive" so a best-effort status list can always be rendered.

use crate::catalog::CornerKey;
use crate::schedule::config::{CornerSchedule, ScheduleBook};
use crate::schedule::day::{HolidayCalendar, ServiceDay, classify};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CornerStatus {
    pub corner_id: String,
    pub is_active: bool,
}

/// Schedule-only activity for one corner. Unknown corners are inactive,
/// not an error.
pub fn is_active(
    book: &ScheduleBook,
    key: &CornerKey,
    date: NaiveDate,
    minute_of_day: u16,
    holidays: &dyn HolidayCalendar,
) -> bool {
    match book.get(key) {
        Some(schedule) => active_for_day(schedule, classify(date, holidays), minute_of_day),
        None => false,
    }
}

fn active_for_day(schedule: &CornerSchedule, day: ServiceDay, minute: u16) -> bool {
    match day {
        // Sundays and holidays serve only when an explicit Sunday window
        // list exists; breaks are not consulted.
        ServiceDay::Sunday | ServiceDay::Holiday => {
            schedule.sunday.iter().any(|w| w.contains(minute))
        }
        day => {
            let windows = schedule.operating_windows(day);
            if windows.is_empty() {
                return false;
            }
            windows.iter().any(|w| w.contains(minute))
                && !schedule.break_windows(day).iter().any(|w| w.contains(minute))
        }
    }
}

/// Batch status for every corner of a restaurant, in input order. A second
/// pass applies the menu-presence rule: corners flagged `requires_menu_data`
/// are active only when a menu entry exists for the date.
pub fn statuses(
    book: &ScheduleBook,
    restaurant_id: &str,
    corner_order: &[String],
    date: NaiveDate,
    minute_of_day: u16,
    holidays: &dyn HolidayCalendar,
    menu_present: &HashMap<String, bool>,
) -> Vec<CornerStatus> {
    corner_order
        .iter()
        .map(|corner_id| {
            let key = CornerKey::new(restaurant_id, corner_id);
            let mut active = is_active(book, &key, date, minute_of_day, holidays);
            if active
                && book.get(&key).is_some_and(|s| s.requires_menu_data)
                && !menu_present.get(corner_id).copied().unwrap_or(false)
            {
                active = false;
            }
            CornerStatus {
                corner_id: corner_id.clone(),
                is_active: active,
            }
        })
        .collect()
}

/// Stable two-way partition: active corners first, each side preserving its
/// original relative order.
pub fn sort_active_first(statuses: Vec<CornerStatus>) -> Vec<CornerStatus> {
    let (mut active, inactive): (Vec<_>, Vec<_>) =
        statuses.into_iter().partition(|s| s.is_active);
    active.extend(inactive);
    active
}
