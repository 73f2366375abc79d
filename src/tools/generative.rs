//! Planning tools that ask the model itself for structured JSON
//!
//! Both tools answer `[]` on any failure; the planner prompt tells the model
//! what to do with an empty result.

use super::{Tool, ToolContext, ToolOutput};
use crate::llm::LlmRequest;
use crate::plan::{CityStop, ItineraryDay, Meals, DEFAULT_DAY_TITLE};
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::LazyLock;

const ROUTE_SYSTEM_PROMPT: &str = "You are a high-level trip architect. Your job is to break down a long, \
multi-destination trip into a logical sequence of cities. Respond with ONLY a JSON object of the form \
{\"route_plan\": [{\"city\": string, \"country\": string, \"num_days\": integer}]}. \
The num_days values must add up to the trip duration. Do not add any other text or explanation.";

const ITINERARY_SYSTEM_PROMPT: &str = "You are a world-renowned travel blogger known for creating exciting \
and detailed itineraries. Your task is to generate a day-by-day plan.\n\n\
CRITICAL INSTRUCTIONS:\n\
1. Respond with ONLY a JSON object of the form {\"itinerary_list\": [{\"day\": integer, \"title\": string, \
\"activities\": [string], \"meals\": {\"breakfast\": string, \"lunch\": string, \"dinner\": string}}]}. \
Do not add any other text or explanation.\n\
2. For EVERY SINGLE DAY, provide at least 3-4 distinct, specific, and exciting activities.\n\
3. AVOID GENERIC PHRASES like \"explore the city\" or \"enjoy local cuisine\". Be specific: \
\"Wander through the charming streets of Le Marais\".\n\
4. Give each day a creative and descriptive title.";

/// A fenced block if there is one, otherwise the outermost bracketed span
static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("valid fenced JSON pattern"));
static BARE_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)[\[{].*[\]}]").expect("valid bare JSON pattern"));

fn extract_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Some(value);
    }
    let candidate = FENCED_JSON
        .captures(text)
        .and_then(|c| c.get(1))
        .or_else(|| BARE_JSON.find(text))?;
    serde_json::from_str(candidate.as_str().trim()).ok()
}

/// Either `{"<key>": [...]}` or a bare list
#[derive(Deserialize)]
#[serde(untagged)]
enum Wrapped<T> {
    Keyed(std::collections::HashMap<String, Vec<T>>),
    Bare(Vec<T>),
}

fn parse_list<T: DeserializeOwned>(text: &str, key: &str) -> Option<Vec<T>> {
    match serde_json::from_value::<Wrapped<T>>(extract_json(text)?).ok()? {
        Wrapped::Bare(items) => Some(items),
        Wrapped::Keyed(mut map) => map.remove(key),
    }
}

fn interests_list(interests: &[String]) -> String {
    if interests.is_empty() {
        "general sightseeing".to_string()
    } else {
        interests.join(", ")
    }
}

/// Ask the default model; `None` on any failure, after logging it
async fn ask_model(ctx: &ToolContext, tool: &str, system: &str, user: String) -> Option<String> {
    let Some(llm) = ctx.llm_registry().default() else {
        tracing::warn!(tool, "No model configured for generative tool");
        return None;
    };
    match llm.complete(&LlmRequest::prompt(system, user)).await {
        Ok(response) => Some(response.text()),
        Err(e) => {
            tracing::warn!(tool, error = %e, "Generative tool request failed");
            None
        }
    }
}

// ============================================================================
// create_multicity_route
// ============================================================================

pub struct CreateMulticityRouteTool;

#[derive(Debug, Deserialize)]
struct RouteInput {
    region: String,
    duration_days: u32,
    #[serde(default)]
    interests: Vec<String>,
}

#[async_trait]
impl Tool for CreateMulticityRouteTool {
    fn name(&self) -> &'static str {
        "create_multicity_route"
    }

    fn description(&self) -> String {
        "Creates a high-level, multi-city travel route for large regions like 'Europe' or \
         'Southeast Asia'. Returns a list of city stops, or an empty list on failure."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["region", "duration_days"],
            "properties": {
                "region": {"type": "string"},
                "duration_days": {"type": "integer", "minimum": 1},
                "interests": {"type": "array", "items": {"type": "string"}}
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: RouteInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let prompt = format!(
            "Generate a route for a {}-day trip to {} with interests in {}.",
            input.duration_days,
            input.region,
            interests_list(&input.interests)
        );
        let stops: Vec<CityStop> = ask_model(&ctx, self.name(), ROUTE_SYSTEM_PROMPT, prompt)
            .await
            .and_then(|text| parse_list(&text, "route_plan"))
            .unwrap_or_default()
            .into_iter()
            .filter(|s: &CityStop| !s.city.trim().is_empty() && s.num_days > 0)
            .collect();

        if stops.is_empty() {
            tracing::warn!(session = %ctx.session_key, region = %input.region, "Route generation produced nothing");
        }
        ToolOutput::json(&stops)
    }
}

// ============================================================================
// generate_itinerary
// ============================================================================

pub struct GenerateItineraryTool;

#[derive(Debug, Deserialize)]
struct ItineraryInput {
    #[serde(alias = "city")]
    destination: String,
    #[serde(alias = "num_days")]
    duration_days: u32,
    #[serde(default)]
    interests: Vec<String>,
}

/// Model output is looser than the plan schema: numbering and titles are filled in
#[derive(Debug, Deserialize)]
struct GeneratedDay {
    day: Option<u32>,
    title: Option<String>,
    #[serde(default)]
    activities: Vec<String>,
    #[serde(default)]
    meals: Meals,
}

fn normalize_days(days: Vec<GeneratedDay>) -> Vec<ItineraryDay> {
    days.into_iter()
        .zip(1u32..)
        .map(|(d, position)| ItineraryDay {
            day: d.day.filter(|n| *n > 0).unwrap_or(position),
            title: d
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DAY_TITLE.to_string()),
            activities: d.activities,
            meals: d.meals,
        })
        .collect()
}

#[async_trait]
impl Tool for GenerateItineraryTool {
    fn name(&self) -> &'static str {
        "generate_itinerary"
    }

    fn description(&self) -> String {
        "Generates a complete, multi-day itinerary for one city in a single step. \
         Returns a list of days, or an empty list on failure."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["destination", "duration_days"],
            "properties": {
                "destination": {"type": "string", "description": "City to plan"},
                "duration_days": {"type": "integer", "minimum": 1},
                "interests": {"type": "array", "items": {"type": "string"}}
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: ItineraryInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let prompt = format!(
            "Generate an itinerary for a {}-day trip to {} with interests in {}.",
            input.duration_days,
            input.destination,
            interests_list(&input.interests)
        );
        let days = ask_model(&ctx, self.name(), ITINERARY_SYSTEM_PROMPT, prompt)
            .await
            .and_then(|text| parse_list::<GeneratedDay>(&text, "itinerary_list"))
            .map(normalize_days)
            .unwrap_or_default();

        if days.is_empty() {
            tracing::warn!(session = %ctx.session_key, city = %input.destination, "Itinerary generation produced nothing");
        }
        ToolOutput::json(&days)
    }
}
