//! Restaurant/corner catalog.
//!
//! A plain JSON object on disk describing every restaurant, its corners in
//! display order, their operating schedules, and per-corner wait-formula
//! parameters. Loaded once at startup and immutable afterwards; every
//! fan-out enumerates its (restaurant, corner) pairs.
//!
//! ```json
//! {
//!   "restaurants": [
//!     {
//!       "id": "student-hall",
//!       "corners": [
//!         {
//!           "id": "western",
//!           "weekday": ["11:00-14:30"],
//!           "breaks": { "weekday": ["12:30-13:00"] },
//!           "requires_menu_data": true,
//!           "cap_minutes": 18
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::schedule::config::{CornerSchedule, ScheduleBook};
use crate::schedule::day::ServiceDay;
use crate::schedule::window::TimeWindow;
use crate::wait::{WaitModel, WaitParams};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Composite identity of a single service counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CornerKey {
    pub restaurant_id: String,
    pub corner_id: String,
}

impl CornerKey {
    pub fn new(restaurant_id: impl Into<String>, corner_id: impl Into<String>) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            corner_id: corner_id.into(),
        }
    }

    /// Store partition key convention: `CORNER#{restaurantId}#{cornerId}`.
    pub fn partition_key(&self) -> String {
        format!("CORNER#{}#{}", self.restaurant_id, self.corner_id)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid catalog entry: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    restaurants: Vec<RestaurantCfg>,
}

#[derive(Debug, Deserialize)]
struct RestaurantCfg {
    id: String,
    corners: Vec<CornerCfg>,
}

#[derive(Debug, Deserialize)]
struct CornerCfg {
    id: String,
    #[serde(default)]
    weekday: Vec<String>,
    #[serde(default)]
    saturday: Vec<String>,
    #[serde(default)]
    sunday: Vec<String>,
    #[serde(default)]
    breaks: HashMap<String, Vec<String>>,
    #[serde(default)]
    requires_menu_data: bool,
    service_rate: Option<f64>,
    overhead_minutes: Option<f64>,
    cap_minutes: Option<u32>,
}

/// Immutable catalog: corner display order per restaurant, the schedule
/// book, and the wait model.
#[derive(Debug, Clone)]
pub struct Catalog {
    restaurants: Vec<(String, Vec<String>)>,
    schedules: ScheduleBook,
    wait: WaitModel,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(contents)?;

        let mut restaurants = Vec::with_capacity(file.restaurants.len());
        let mut schedules = ScheduleBook::default();
        let mut wait_params = HashMap::new();

        for restaurant in file.restaurants {
            let mut corner_order = Vec::with_capacity(restaurant.corners.len());
            for corner in restaurant.corners {
                let key = CornerKey::new(&restaurant.id, &corner.id);

                let mut breaks = HashMap::new();
                for (day, windows) in &corner.breaks {
                    breaks.insert(parse_day(day)?, parse_windows(windows)?);
                }
                schedules.insert(
                    key.clone(),
                    CornerSchedule {
                        weekday: parse_windows(&corner.weekday)?,
                        saturday: parse_windows(&corner.saturday)?,
                        sunday: parse_windows(&corner.sunday)?,
                        breaks,
                        requires_menu_data: corner.requires_menu_data,
                    },
                );

                let defaults = WaitParams::default();
                wait_params.insert(
                    key,
                    WaitParams {
                        service_rate: corner.service_rate.unwrap_or(defaults.service_rate),
                        overhead_minutes: corner
                            .overhead_minutes
                            .unwrap_or(defaults.overhead_minutes),
                        cap_minutes: corner.cap_minutes.unwrap_or(defaults.cap_minutes),
                    },
                );
                corner_order.push(corner.id);
            }
            restaurants.push((restaurant.id, corner_order));
        }

        Ok(Self {
            restaurants,
            schedules,
            wait: WaitModel::new(wait_params),
        })
    }

    /// Every (restaurant, corner) pair, in catalog order.
    pub fn corner_keys(&self) -> Vec<CornerKey> {
        self.restaurants
            .iter()
            .flat_map(|(restaurant, corners)| {
                corners
                    .iter()
                    .map(move |corner| CornerKey::new(restaurant, corner))
            })
            .collect()
    }

    /// Corner IDs of one restaurant in display order.
    pub fn corners_of(&self, restaurant_id: &str) -> Option<&[String]> {
        self.restaurants
            .iter()
            .find(|(id, _)| id == restaurant_id)
            .map(|(_, corners)| corners.as_slice())
    }

    pub fn schedules(&self) -> &ScheduleBook {
        &self.schedules
    }

    pub fn wait_model(&self) -> &WaitModel {
        &self.wait
    }
}

fn parse_windows(raw: &[String]) -> Result<Vec<TimeWindow>, CatalogError> {
    raw.iter()
        .map(|s| TimeWindow::parse(s).map_err(|e| CatalogError::Invalid(e.to_string())))
        .collect()
}

fn parse_day(raw: &str) -> Result<ServiceDay, CatalogError> {
    match raw {
        "weekday" => Ok(ServiceDay::Weekday),
        "saturday" => Ok(ServiceDay::Saturday),
        "sunday" => Ok(ServiceDay::Sunday),
        "holiday" => Ok(ServiceDay::Holiday),
        other => Err(CatalogError::Invalid(format!("unknown day type '{other}'"))),
    }
}
