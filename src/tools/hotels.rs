//! Hotel search through the Booking.com API on RapidAPI

use super::{Tool, ToolContext, ToolOutput};
use crate::plan::HotelOption;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const HOTELS_URL: &str = "https://booking-com.p.rapidapi.com/v1/hotels/search-by-destination";
const HOTELS_HOST: &str = "booking-com.p.rapidapi.com";
const MAX_HOTELS: usize = 3;

pub struct HotelSearchTool;

fn default_adults() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct HotelSearchInput {
    city_name: String,
    check_in_date: String,
    check_out_date: String,
    #[serde(default = "default_adults")]
    num_adults: u32,
}

#[derive(Debug, Deserialize)]
struct HotelsResponse {
    #[serde(default)]
    result: Vec<RawHotel>,
}

#[derive(Debug, Deserialize)]
struct RawHotel {
    hotel_name: Option<String>,
    class: Option<f64>,
    min_total_price: Option<f64>,
    currency_code: Option<String>,
    review_score: Option<f64>,
}

fn top_hotels(response: HotelsResponse) -> Vec<HotelOption> {
    response
        .result
        .into_iter()
        .take(MAX_HOTELS)
        .map(|h| HotelOption {
            name: h.hotel_name.unwrap_or_else(|| "N/A".to_string()),
            rating: h.class.unwrap_or(0.0),
            price_per_night: format!(
                "{} {}",
                h.min_total_price.unwrap_or(0.0),
                h.currency_code.unwrap_or_default()
            ),
            review_score: h.review_score.unwrap_or(0.0),
        })
        .collect()
}

#[async_trait]
impl Tool for HotelSearchTool {
    fn name(&self) -> &'static str {
        "hotel_search"
    }

    fn description(&self) -> String {
        "Searches for hotels in a given city for the given dates.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["city_name", "check_in_date", "check_out_date"],
            "properties": {
                "city_name": {"type": "string"},
                "check_in_date": {"type": "string", "description": "YYYY-MM-DD"},
                "check_out_date": {"type": "string", "description": "YYYY-MM-DD"},
                "num_adults": {"type": "integer", "minimum": 1, "default": 1}
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: HotelSearchInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error_list(format!("Invalid input: {e}")),
        };
        let Some(api_key) = ctx.config().rapidapi_key.as_deref() else {
            return ToolOutput::error_list("RAPIDAPI_KEY is not set");
        };

        let adults = input.num_adults.max(1).to_string();
        let response = ctx
            .http()
            .get(HOTELS_URL)
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", HOTELS_HOST)
            .query(&[
                ("dest_type", "city"),
                ("dest_name", input.city_name.as_str()),
                ("checkin_date", input.check_in_date.as_str()),
                ("checkout_date", input.check_out_date.as_str()),
                ("adults_number", adults.as_str()),
                ("order_by", "popularity"),
                ("units", "metric"),
                ("room_number", "1"),
                ("locale", "en-gb"),
                ("currency", "INR"),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let body = match response {
            Ok(r) => r.json::<HotelsResponse>().await,
            Err(e) => return ToolOutput::error_list(format!("API request failed: {e}")),
        };

        match body.map(top_hotels) {
            Ok(hotels) if hotels.is_empty() => {
                ToolOutput::error_list("No hotels found for the given location and dates.")
            }
            Ok(hotels) => ToolOutput::json(&hotels),
            Err(e) => ToolOutput::error_list(format!("Unexpected hotel data: {e}")),
        }
    }
}
