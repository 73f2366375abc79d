//! Plan data model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Title used when a generator omits one for a day
pub const DEFAULT_DAY_TITLE: &str = "A day of exploration";

/// One city in a multi-city route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityStop {
    pub city: String,
    pub country: String,
    pub num_days: u32,
}

impl CityStop {
    pub fn new(city: impl Into<String>, country: impl Into<String>, num_days: u32) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
            num_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOption {
    pub airline: String,
    pub price: String,
    pub departure_time: String,
    pub arrival_time: String,
    #[serde(alias = "stop_count")]
    pub stops: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelOption {
    pub name: String,
    pub rating: f64,
    pub price_per_night: String,
    pub review_score: f64,
}

/// Meal suggestions for a day: either per-meal entries or one description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Meals {
    ByMeal(BTreeMap<String, String>),
    Summary(String),
}

impl Default for Meals {
    fn default() -> Self {
        Meals::ByMeal(BTreeMap::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryDay {
    pub day: u32,
    #[serde(default = "default_day_title")]
    pub title: String,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub meals: Meals,
}

fn default_day_title() -> String {
    DEFAULT_DAY_TITLE.to_string()
}

impl ItineraryDay {
    pub fn new(day: u32, title: impl Into<String>) -> Self {
        Self {
            day,
            title: title.into(),
            activities: Vec::new(),
            meals: Meals::default(),
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_activities<I, S>(mut self, activities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.activities = activities.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetItem {
    pub category: String,
    pub estimated_cost: f64,
    pub currency: String,
}

/// Planning status. `Complete` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Planning,
    Complete,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Planning => "planning",
            PlanStatus::Complete => "complete",
        }
    }
}

/// Accumulated knowledge of one trip-planning session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub session_key: String,
    /// Store-assigned version; 0 means never saved
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub origin_city: Option<String>,
    #[serde(default, alias = "origin_iata")]
    pub origin_airport_code: Option<String>,
    #[serde(default, alias = "destination_iata")]
    pub destination_airport_code: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub route: Vec<CityStop>,
    #[serde(default)]
    pub current_city_index: u32,
    #[serde(default)]
    pub flights: Vec<FlightOption>,
    #[serde(default)]
    pub accommodation: Vec<HotelOption>,
    #[serde(default)]
    pub itinerary: Vec<ItineraryDay>,
    #[serde(default)]
    pub budget: Vec<BudgetItem>,
    #[serde(default)]
    pub status: PlanStatus,
}

impl Plan {
    pub fn new(session_key: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            version: 0,
            origin_city: None,
            origin_airport_code: None,
            destination_airport_code: None,
            destination: None,
            duration_days: None,
            interests: Vec::new(),
            route: Vec::new(),
            current_city_index: 0,
            flights: Vec::new(),
            accommodation: Vec::new(),
            itinerary: Vec::new(),
            budget: Vec::new(),
            status: PlanStatus::Planning,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == PlanStatus::Complete
    }

    /// The stop the cursor points at, if any remain
    pub fn current_city(&self) -> Option<&CityStop> {
        self.route.get(self.current_city_index as usize)
    }

    pub fn route_len(&self) -> u32 {
        u32::try_from(self.route.len()).unwrap_or(u32::MAX)
    }

    /// Number of itinerary days assembled so far
    pub fn planned_days(&self) -> u32 {
        self.itinerary.last().map_or(0, |d| d.day)
    }

    /// Days the route allots to every stop up to and including the current one
    pub fn days_through_current_city(&self) -> u32 {
        self.route
            .iter()
            .take(self.current_city_index as usize + 1)
            .fold(0u32, |total, stop| total.saturating_add(stop.num_days))
    }
}
