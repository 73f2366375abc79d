//! One-way flight search through the Flight Data API on RapidAPI

use super::{Tool, ToolContext, ToolOutput};
use crate::plan::FlightOption;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const FLIGHTS_URL: &str = "https://flight-data.p.rapidapi.com/search_one_way/";
const FLIGHTS_HOST: &str = "flight-data.p.rapidapi.com";
const MAX_FLIGHTS: usize = 3;
const PRICE_CURRENCY: &str = "INR";

pub struct FlightSearchTool;

#[derive(Debug, Deserialize)]
struct FlightSearchInput {
    #[serde(alias = "origin_iata")]
    origin: String,
    #[serde(alias = "destination_iata")]
    destination: String,
    departure_date: String,
}

#[derive(Debug, Deserialize)]
struct FlightsResponse {
    #[serde(default)]
    flights: Vec<RawFlight>,
}

#[derive(Debug, Deserialize)]
struct RawFlight {
    airline: Named,
    price: Price,
    departure: Scheduled,
    arrival: Scheduled,
    #[serde(default)]
    stops: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Price {
    amount: Value,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct Scheduled {
    scheduled_time: String,
}

fn top_flights(response: FlightsResponse) -> Vec<FlightOption> {
    response
        .flights
        .into_iter()
        .take(MAX_FLIGHTS)
        .map(|f| FlightOption {
            airline: f.airline.name,
            price: format!("{} {}", display_amount(&f.price.amount), f.price.currency),
            departure_time: f.departure.scheduled_time,
            arrival_time: f.arrival.scheduled_time,
            stops: u32::try_from(f.stops.len()).unwrap_or(u32::MAX),
        })
        .collect()
}

fn display_amount(amount: &Value) -> String {
    match amount {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Tool for FlightSearchTool {
    fn name(&self) -> &'static str {
        "flight_search"
    }

    fn description(&self) -> String {
        "Searches for one-way flights. You must provide the IATA codes for the origin and \
         destination airports; use search_place to look them up."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["origin", "destination", "departure_date"],
            "properties": {
                "origin": {"type": "string", "description": "Origin airport IATA code"},
                "destination": {"type": "string", "description": "Destination airport IATA code"},
                "departure_date": {"type": "string", "description": "YYYY-MM-DD"}
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: FlightSearchInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error_list(format!("Invalid input: {e}")),
        };
        let Some(api_key) = ctx.config().rapidapi_key.as_deref() else {
            return ToolOutput::error_list("RAPIDAPI_KEY is not set");
        };

        let response = ctx
            .http()
            .get(FLIGHTS_URL)
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", FLIGHTS_HOST)
            .query(&[
                ("origin_iata", input.origin.as_str()),
                ("destination_iata", input.destination.as_str()),
                ("departure_date", input.departure_date.as_str()),
                ("currency", PRICE_CURRENCY),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let body = match response {
            Ok(r) => r.json::<FlightsResponse>().await,
            Err(e) => return ToolOutput::error_list(format!("API request failed: {e}")),
        };

        match body.map(top_flights) {
            Ok(flights) if flights.is_empty() => {
                ToolOutput::error_list("No flights found for the given route and date.")
            }
            Ok(flights) => ToolOutput::json(&flights),
            Err(e) => ToolOutput::error_list(format!("Unexpected flight data: {e}")),
        }
    }
}
