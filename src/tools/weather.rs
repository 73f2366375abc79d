//! Weather tool backed by weatherapi.com

use super::{Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const WEATHER_URL: &str = "http://api.weatherapi.com/v1/current.json";

pub struct WeatherInfoTool;

#[derive(Debug, Deserialize)]
struct WeatherInput {
    location: String,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    current: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temp_c: f64,
    feelslike_c: f64,
    humidity: f64,
    condition: Condition,
}

#[derive(Debug, Deserialize)]
struct Condition {
    text: String,
}

fn describe(location: &str, response: WeatherResponse) -> String {
    match response.current {
        Some(w) => format!(
            "The current weather in {location} is {}°C and feels like {}°C. \
             The condition is {} with {}% humidity.",
            w.temp_c, w.feelslike_c, w.condition.text, w.humidity
        ),
        None => format!(
            "Could not fetch weather for {location}. The API might not recognize the location."
        ),
    }
}

#[async_trait]
impl Tool for WeatherInfoTool {
    fn name(&self) -> &'static str {
        "weather_info"
    }

    fn description(&self) -> String {
        "Get current weather information for a given city.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["location"],
            "properties": {
                "location": {"type": "string", "description": "City name, e.g. \"Rome\""}
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: WeatherInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };
        let Some(api_key) = ctx.config().weather_api_key.as_deref() else {
            return ToolOutput::error("WEATHER_API_KEY is not set");
        };

        let response = ctx
            .http()
            .get(WEATHER_URL)
            .query(&[("key", api_key), ("q", input.location.as_str())])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let body = match response {
            Ok(r) => r.json::<WeatherResponse>().await,
            Err(e) => return ToolOutput::error(format!("Weather API error: {e}")),
        };

        match body {
            Ok(body) => ToolOutput::success(describe(&input.location, body)),
            Err(e) => ToolOutput::error(format!("Weather API error: {e}")),
        }
    }
}
