//! Planner system prompt
//!
//! The prompt carries the execution script the model must follow, the
//! current plan as JSON, and the router's classification of the next step.

use crate::plan::{route, ActionCategory, CityStep, CityStop, FinalizeStep, Plan};
use std::fmt::Write;

/// Route used when `create_multicity_route` comes back empty for a
/// 15-day Europe trip
pub fn default_europe_route() -> Vec<CityStop> {
    vec![
        CityStop::new("Paris", "France", 5),
        CityStop::new("Rome", "Italy", 5),
        CityStop::new("Amsterdam", "Netherlands", 5),
    ]
}

const EXECUTION_SCRIPT: &str = r#"You are a hyper-methodical AI travel agent that functions like a computer program. You will be given the current `TripPlan` state and you MUST determine the single next action to take based on the strict `if/elif/else` logic below.

**EXECUTION SCRIPT:**

**IF the `route` list in the plan is empty:**
    1.  Record any trip facts from the user's request (origin_city, destination, duration_days, interests) with `update_plan`.
    2.  Call the `create_multicity_route` tool.
    3.  Save the returned stops with `update_plan` as `route`.
    4.  **Self-Correction:** If that tool returns an empty list, immediately call `update_plan` with a default route. For a 15-day "Europe" trip, the default is: `{DEFAULT_ROUTE}`.

**ELIF `current_city_index` < `len(route)`:**
    1.  **Get Current Task:** The city to plan is `route[current_city_index]`.
    2.  **Check for Itinerary:** The itinerary for this city is present when the number of days in `itinerary` is at least the sum of `num_days` for all cities up to and including the current one.
    3.  **IF the itinerary for the current city is MISSING:**
        -   Call `generate_itinerary` for the current city and its `num_days`, then save the returned days with `update_plan` as `itinerary`. Days are renumbered automatically; do not try to continue the numbering yourself.
    4.  **ELSE (the itinerary for the current city is PRESENT):**
        -   Call `update_plan` and set `current_city_index` to `current_city_index + 1`. Do this in its own update, never together with itinerary days.

**ELIF `current_city_index` == `len(route)` and `status` != 'complete':**
    1.  **Personalized Budget:** If `budget` is empty, create a sample budget. Infer the user's local currency from their origin city (e.g., "Gwalior, India" implies INR). The budget MUST be in that currency. Save it with `update_plan`.
    2.  **IF a budget already exists:** Set `status` to 'complete' with `update_plan`, then reply with the final, polished, engaging summary for the user. The summary should be vibrant, highlight a "must-do" experience, offer a practical tip, transparently mention any tool failures, and wish them a fantastic trip.

**RULES:**
- **YOU MUST ONLY OUTPUT TOOL CALLS**, except for the very final summary once `status` is 'complete'.
- **DO NOT TALK TO THE USER.** Do not ask for clarification. Follow the script.
- **ONE ACTION PER TURN.**
- If `update_plan` returns an error, read its `path` and send a corrected update.
- Flights, hotels, weather and places are optional enrichments; save useful results to `flights` or `accommodation` with `update_plan`."#;

/// Human-readable description of the next step
fn describe_next_action(category: &ActionCategory) -> String {
    match category {
        ActionCategory::DefineRoute => "Define the multi-city route.".to_string(),
        ActionCategory::PlanCurrentCity { index, stop, step } => match step {
            CityStep::GenerateItinerary => format!(
                "Generate the {}-day itinerary for {}, {} (route index {index}).",
                stop.num_days, stop.city, stop.country
            ),
            CityStep::AdvanceCity => format!(
                "{} is planned. Advance current_city_index to {}.",
                stop.city,
                index + 1
            ),
        },
        ActionCategory::Finalize {
            step: FinalizeStep::ComposeBudget,
        } => "All cities are planned. Compose the budget in the traveller's local currency.".to_string(),
        ActionCategory::Finalize {
            step: FinalizeStep::Complete,
        } => "Budget saved. Mark the plan complete and write the final summary.".to_string(),
        ActionCategory::Terminal => {
            "The plan is complete. Answer the user without calling tools.".to_string()
        }
    }
}

/// Build the system prompt for one decision
pub fn build_system_prompt(plan: &Plan) -> String {
    let default_route =
        serde_json::to_string(&default_europe_route()).unwrap_or_else(|_| "[]".to_string());
    let mut prompt = EXECUTION_SCRIPT.replace("{DEFAULT_ROUTE}", &default_route);

    let plan_json = serde_json::to_string_pretty(plan).unwrap_or_else(|_| "{}".to_string());
    prompt.push_str("\n\n**Current Trip Plan State:**\n<TripPlan>\n");
    prompt.push_str(&plan_json);
    prompt.push_str("\n</TripPlan>");

    let _ = write!(
        prompt,
        "\n\n<NextAction>{}</NextAction>",
        describe_next_action(&route(plan))
    );

    prompt
}
