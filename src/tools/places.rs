//! Place search via the Google Places text search API

use super::{Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const PLACES_URL: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";
const MAX_PLACES: usize = 5;

pub struct SearchPlaceTool;

#[derive(Debug, Deserialize)]
struct SearchPlaceInput {
    query: String,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    results: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    name: Option<String>,
    formatted_address: Option<String>,
    rating: Option<f64>,
    place_id: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
struct Place {
    name: Option<String>,
    address: Option<String>,
    rating: Option<f64>,
    place_id: Option<String>,
}

fn top_places(response: PlacesResponse) -> Vec<Place> {
    response
        .results
        .into_iter()
        .take(MAX_PLACES)
        .map(|p| Place {
            name: p.name,
            address: p.formatted_address,
            rating: p.rating,
            place_id: p.place_id,
        })
        .collect()
}

#[async_trait]
impl Tool for SearchPlaceTool {
    fn name(&self) -> &'static str {
        "search_place"
    }

    fn description(&self) -> String {
        "General purpose search for places, attractions, airports, or cities. \
         Use queries like \"tourist attractions in Goa\", \"airport in Delhi\" to find an IATA code, \
         or \"Goa city\". Returns up to five places with name, address, rating and place id."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {"type": "string", "description": "Free-text search query"}
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: SearchPlaceInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error_list(format!("Invalid input: {e}")),
        };
        let Some(api_key) = ctx.config().google_api_key.as_deref() else {
            return ToolOutput::error_list("GOOGLE_API_KEY is not set");
        };

        let response = ctx
            .http()
            .get(PLACES_URL)
            .query(&[("query", input.query.as_str()), ("key", api_key)])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let body = match response {
            Ok(r) => r.json::<PlacesResponse>().await,
            Err(e) => return ToolOutput::error_list(format!("Place search API error: {e}")),
        };

        match body.map(top_places) {
            Ok(places) if places.is_empty() => {
                ToolOutput::error_list(format!("No places found for query: {}", input.query))
            }
            Ok(places) => ToolOutput::json(&places),
            Err(e) => ToolOutput::error_list(format!("Place search API error: {e}")),
        }
    }
}
