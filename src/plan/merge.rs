//! Merge engine
//!
//! `merge` is a total function: it validates the whole payload first and then
//! builds a new plan, so a rejected payload never leaves a half-applied plan.

use super::model::{ItineraryDay, Plan, PlanStatus};
use super::payload::{UpdatePayload, ValidationError};

/// Apply `payload` to `current`, returning the merged plan.
///
/// - scalars overwrite
/// - list fields append with structural deduplication
/// - itinerary days are renumbered to continue after the last existing day
/// - once the plan is complete, or the payload itself completes it, `route`,
///   `itinerary` and `current_city_index` are frozen; attempts to change them
///   are ignored
pub fn merge(current: &Plan, payload: &UpdatePayload) -> Result<Plan, ValidationError> {
    payload.validate()?;

    let already_complete = current.is_complete();
    let locked = already_complete || payload.status == Some(PlanStatus::Complete);
    let mut next = current.clone();

    overwrite(&mut next.origin_city, payload.origin_city.as_ref());
    overwrite(&mut next.origin_airport_code, payload.origin_airport_code.as_ref());
    overwrite(
        &mut next.destination_airport_code,
        payload.destination_airport_code.as_ref(),
    );
    overwrite(&mut next.destination, payload.destination.as_ref());
    if let Some(days) = payload.duration_days {
        next.duration_days = Some(days);
    }

    append_unique(&mut next.interests, payload.interests.as_deref());
    append_unique(&mut next.flights, payload.flights.as_deref());
    append_unique(&mut next.accommodation, payload.accommodation.as_deref());
    append_unique(&mut next.budget, payload.budget.as_deref());

    if locked {
        if payload.route.is_some() || payload.has_itinerary() || payload.current_city_index.is_some()
        {
            tracing::debug!(
                session = %current.session_key,
                "Plan is complete; ignoring route/itinerary/index changes"
            );
        }
    } else {
        append_unique(&mut next.route, payload.route.as_deref());
        if let Some(days) = payload.itinerary.as_deref() {
            append_renumbered(&mut next.itinerary, days);
        }
        if let Some(index) = payload.current_city_index {
            next.current_city_index = index;
        }
    }

    if let Some(status) = payload.status {
        if !already_complete {
            next.status = status;
        }
    }

    Ok(next)
}

fn overwrite(target: &mut Option<String>, value: Option<&String>) {
    if let Some(value) = value {
        *target = Some(value.clone());
    }
}

/// Append every incoming element not already structurally present
fn append_unique<T: Clone + PartialEq>(target: &mut Vec<T>, incoming: Option<&[T]>) {
    for item in incoming.unwrap_or_default() {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

/// Append a chunk of days, discarding the chunk's own day numbers
fn append_renumbered(itinerary: &mut Vec<ItineraryDay>, chunk: &[ItineraryDay]) {
    let mut day = itinerary.last().map_or(0, |d| d.day);
    for entry in chunk {
        day += 1;
        itinerary.push(ItineraryDay {
            day,
            ..entry.clone()
        });
    }
}
