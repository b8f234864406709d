pub mod config;
pub mod day;
pub mod engine;
pub mod window;

pub use config::{CornerSchedule, ScheduleBook};
pub use day::{HolidayCalendar, NoHolidays, ServiceDay, classify, parse_date_key};
pub use engine::{CornerStatus, is_active, sort_active_first, statuses};
pub use window::{TimeWindow, parse_clock};
