//! Action router
//!
//! A pure classification of what kind of step is legal next, given only the
//! plan. The reasoning model is told the same rules in its prompt; the
//! orchestrator uses [`guard_update`] to hold it to them.

use super::model::{CityStop, Plan, PlanStatus};
use super::payload::{UpdatePayload, ValidationError};
use serde::Serialize;

/// Next-step category for a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ActionCategory {
    /// No route yet: the multi-city route must be defined
    DefineRoute,
    /// Work on `route[index]`
    PlanCurrentCity {
        index: u32,
        stop: CityStop,
        step: CityStep,
    },
    /// All cities planned: budget, then completion
    Finalize { step: FinalizeStep },
    /// Nothing more to do
    Terminal,
}

/// Sub-step while planning one city
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CityStep {
    GenerateItinerary,
    AdvanceCity,
}

/// Sub-step while finalizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeStep {
    ComposeBudget,
    Complete,
}

impl ActionCategory {
    pub fn name(&self) -> &'static str {
        match self {
            ActionCategory::DefineRoute => "define_route",
            ActionCategory::PlanCurrentCity { .. } => "plan_current_city",
            ActionCategory::Finalize { .. } => "finalize",
            ActionCategory::Terminal => "terminal",
        }
    }
}

/// Classify the plan. Total: every plan maps to exactly one category.
pub fn route(plan: &Plan) -> ActionCategory {
    if plan.route.is_empty() {
        return ActionCategory::DefineRoute;
    }

    if let Some(stop) = plan.current_city() {
        let step = if plan.planned_days() >= plan.days_through_current_city() {
            CityStep::AdvanceCity
        } else {
            CityStep::GenerateItinerary
        };
        return ActionCategory::PlanCurrentCity {
            index: plan.current_city_index,
            stop: stop.clone(),
            step,
        };
    }

    if plan.current_city_index == plan.route_len() && !plan.is_complete() {
        let step = if plan.budget.is_empty() {
            FinalizeStep::ComposeBudget
        } else {
            FinalizeStep::Complete
        };
        return ActionCategory::Finalize { step };
    }

    ActionCategory::Terminal
}

/// Reject updates that would break the planning contract.
///
/// The merge engine applies whatever it is given; this guard is what keeps
/// `current_city_index` monotonic, bounded and advanced one city at a time,
/// in a separate update from the itinerary that planned the city.
pub fn guard_update(plan: &Plan, payload: &UpdatePayload) -> Result<(), ValidationError> {
    if plan.is_complete() {
        // Structural fields are frozen by merge itself; nothing to police.
        return Ok(());
    }

    if let Some(index) = payload.current_city_index {
        let current = plan.current_city_index;
        if index < current {
            return Err(ValidationError::new(
                "current_city_index",
                format!("cannot move back from {current} to {index}"),
            ));
        }
        if index > current + 1 {
            return Err(ValidationError::new(
                "current_city_index",
                format!("may only advance one city at a time ({current} -> {index})"),
            ));
        }

        let incoming_stops = payload
            .route
            .as_ref()
            .map_or(0, |stops| stops.iter().filter(|s| !plan.route.contains(s)).count());
        let route_len = plan.route.len() + incoming_stops;
        if index as usize > route_len {
            return Err(ValidationError::new(
                "current_city_index",
                format!("{index} is past the end of a {route_len}-city route"),
            ));
        }

        if index > current && payload.has_itinerary() {
            return Err(ValidationError::new(
                "current_city_index",
                "advance to the next city in a separate update after saving the itinerary",
            ));
        }
    }

    // A completing payload freezes its own route and index, so only the
    // stored plan decides whether completion is allowed.
    if payload.status == Some(PlanStatus::Complete) {
        if !matches!(
            route(plan),
            ActionCategory::Finalize { .. } | ActionCategory::Terminal
        ) {
            return Err(ValidationError::new(
                "status",
                "cannot complete the plan before every city in the route is planned",
            ));
        }
    }

    Ok(())
}
