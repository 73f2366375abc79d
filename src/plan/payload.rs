//! Sparse partial updates and their validation

use super::model::{BudgetItem, CityStop, FlightOption, HotelOption, ItineraryDay, PlanStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Longest stay a single route stop may claim
const MAX_STOP_DAYS: u32 = 365;

/// Payload rejected before any field was applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid update at `{path}`: {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Partial plan. Absent fields never overwrite existing data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_airport_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_airport_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Vec<CityStop>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_city_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flights: Option<Vec<FlightOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation: Option<Vec<HotelOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itinerary: Option<Vec<ItineraryDay>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Vec<BudgetItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PlanStatus>,
}

impl UpdatePayload {
    /// Parse untrusted JSON, reporting the first offending field path.
    ///
    /// Nulls are treated as absent. Unknown fields are rejected.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let Value::Object(fields) = value else {
            return Err(ValidationError::new("$", "expected a JSON object"));
        };

        let mut payload = UpdatePayload::default();
        for (key, value) in fields {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "origin_city" => payload.origin_city = Some(parse_field(&key, value)?),
                "origin_airport_code" | "origin_iata" => {
                    payload.origin_airport_code = Some(parse_field(&key, value)?);
                }
                "destination_airport_code" | "destination_iata" => {
                    payload.destination_airport_code = Some(parse_field(&key, value)?);
                }
                "destination" => payload.destination = Some(parse_field(&key, value)?),
                "duration_days" => payload.duration_days = Some(parse_field(&key, value)?),
                "interests" => payload.interests = Some(parse_list(&key, value)?),
                "route" => payload.route = Some(parse_list(&key, value)?),
                "current_city_index" => {
                    payload.current_city_index = Some(parse_field(&key, value)?);
                }
                "flights" => payload.flights = Some(parse_list(&key, value)?),
                "accommodation" => payload.accommodation = Some(parse_list(&key, value)?),
                "itinerary" => payload.itinerary = Some(parse_itinerary(value)?),
                "budget" => payload.budget = Some(parse_list(&key, value)?),
                "status" => payload.status = Some(parse_field(&key, value)?),
                _ => return Err(ValidationError::new(key, "unknown field")),
            }
        }

        payload.validate()?;
        Ok(payload)
    }

    /// Check semantic rules that the types alone do not capture
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.duration_days == Some(0) {
            return Err(ValidationError::new("duration_days", "must be at least 1"));
        }

        for (i, stop) in self.route.iter().flatten().enumerate() {
            if stop.city.trim().is_empty() {
                return Err(ValidationError::new(format!("route[{i}].city"), "must not be empty"));
            }
            if stop.num_days == 0 {
                return Err(ValidationError::new(
                    format!("route[{i}].num_days"),
                    "must be at least 1",
                ));
            }
            if stop.num_days > MAX_STOP_DAYS {
                return Err(ValidationError::new(
                    format!("route[{i}].num_days"),
                    format!("must be at most {MAX_STOP_DAYS}"),
                ));
            }
        }

        for (i, day) in self.itinerary.iter().flatten().enumerate() {
            if day.day == 0 {
                return Err(ValidationError::new(
                    format!("itinerary[{i}].day"),
                    "must be a positive integer",
                ));
            }
        }

        for (i, hotel) in self.accommodation.iter().flatten().enumerate() {
            if !hotel.rating.is_finite() {
                return Err(ValidationError::new(
                    format!("accommodation[{i}].rating"),
                    "must be a finite number",
                ));
            }
            if !hotel.review_score.is_finite() {
                return Err(ValidationError::new(
                    format!("accommodation[{i}].review_score"),
                    "must be a finite number",
                ));
            }
        }

        for (i, item) in self.budget.iter().flatten().enumerate() {
            if !item.estimated_cost.is_finite() || item.estimated_cost < 0.0 {
                return Err(ValidationError::new(
                    format!("budget[{i}].estimated_cost"),
                    "must be a non-negative finite number",
                ));
            }
            if item.currency.trim().is_empty() {
                return Err(ValidationError::new(
                    format!("budget[{i}].currency"),
                    "must not be empty",
                ));
            }
        }

        Ok(())
    }

    /// Whether the payload carries at least one itinerary day
    pub fn has_itinerary(&self) -> bool {
        self.itinerary.as_ref().is_some_and(|days| !days.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        *self == UpdatePayload::default()
    }
}

fn parse_field<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, ValidationError> {
    serde_json::from_value(value).map_err(|e| ValidationError::new(path, e.to_string()))
}

fn parse_list<T: DeserializeOwned>(path: &str, value: Value) -> Result<Vec<T>, ValidationError> {
    let Value::Array(items) = value else {
        return Err(ValidationError::new(path, "expected an array"));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| parse_field(&format!("{path}[{i}]"), item))
        .collect()
}

fn parse_itinerary(value: Value) -> Result<Vec<ItineraryDay>, ValidationError> {
    let Value::Array(items) = value else {
        return Err(ValidationError::new("itinerary", "expected an array"));
    };

    let mut days = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let Value::Object(entry) = item else {
            return Err(ValidationError::new(format!("itinerary[{i}]"), "expected an object"));
        };
        require_positive_day(&entry, i)?;
        days.push(parse_field(&format!("itinerary[{i}]"), Value::Object(entry))?);
    }
    Ok(days)
}

fn require_positive_day(entry: &Map<String, Value>, index: usize) -> Result<(), ValidationError> {
    let path = format!("itinerary[{index}].day");
    match entry.get("day") {
        None | Some(Value::Null) => Err(ValidationError::new(path, "missing required field")),
        Some(day) if day.as_u64().is_some_and(|d| d >= 1) => Ok(()),
        Some(_) => Err(ValidationError::new(path, "must be a positive integer")),
    }
}
