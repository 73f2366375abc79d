//! Property-based tests for merge and routing
//!
//! These tests verify the plan invariants hold for arbitrary update sequences.

use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_city_stop() -> impl Strategy<Value = CityStop> {
    (
        prop_oneof![Just("Paris"), Just("Rome"), Just("Lisbon"), Just("Kyoto")],
        prop_oneof![Just("France"), Just("Italy"), Just("Portugal"), Just("Japan")],
        1u32..6,
    )
        .prop_map(|(city, country, days)| CityStop::new(city, country, days))
}

fn arb_itinerary_day() -> impl Strategy<Value = ItineraryDay> {
    (
        1u32..40,
        "[a-zA-Z ]{1,16}",
        proptest::collection::vec("[a-z ]{1,12}", 0..3),
    )
        .prop_map(|(day, title, activities)| ItineraryDay::new(day, title).with_activities(activities))
}

fn arb_budget_item() -> impl Strategy<Value = BudgetItem> {
    (
        prop_oneof![Just("Food"), Just("Stay"), Just("Transport")],
        0u32..5000,
        prop_oneof![Just("EUR"), Just("INR")],
    )
        .prop_map(|(category, cost, currency)| BudgetItem {
            category: category.to_string(),
            estimated_cost: f64::from(cost),
            currency: currency.to_string(),
        })
}

fn arb_flight() -> impl Strategy<Value = FlightOption> {
    (prop_oneof![Just("Air India"), Just("Lufthansa")], 0u32..3).prop_map(|(airline, stops)| {
        FlightOption {
            airline: airline.to_string(),
            price: "42000 INR".to_string(),
            departure_time: "2025-05-01T10:00".to_string(),
            arrival_time: "2025-05-01T18:00".to_string(),
            stops,
        }
    })
}

fn arb_hotel() -> impl Strategy<Value = HotelOption> {
    (prop_oneof![Just("Hotel Roma"), Just("Le Petit")], 1u32..6).prop_map(|(name, stars)| {
        HotelOption {
            name: name.to_string(),
            rating: f64::from(stars),
            price_per_night: "8000 INR".to_string(),
            review_score: 8.5,
        }
    })
}

fn arb_status() -> impl Strategy<Value = PlanStatus> {
    prop_oneof![Just(PlanStatus::Planning), Just(PlanStatus::Complete)]
}

/// Payloads touching every list field except the itinerary
fn arb_list_payload() -> impl Strategy<Value = UpdatePayload> {
    (
        proptest::option::of(proptest::collection::vec("[a-z]{1,8}", 0..4)),
        proptest::option::of(proptest::collection::vec(arb_city_stop(), 0..4)),
        proptest::option::of(proptest::collection::vec(arb_flight(), 0..3)),
        proptest::option::of(proptest::collection::vec(arb_hotel(), 0..3)),
        proptest::option::of(proptest::collection::vec(arb_budget_item(), 0..3)),
        proptest::option::of("[A-Z][a-z]{2,8}"),
        proptest::option::of(0u32..4),
        proptest::option::of(arb_status()),
    )
        .prop_map(
            |(interests, route, flights, accommodation, budget, destination, index, status)| {
                UpdatePayload {
                    interests,
                    route,
                    flights,
                    accommodation,
                    budget,
                    destination,
                    current_city_index: index,
                    status,
                    ..Default::default()
                }
            },
        )
}

fn arb_any_payload() -> impl Strategy<Value = UpdatePayload> {
    (
        arb_list_payload(),
        proptest::option::of(proptest::collection::vec(arb_itinerary_day(), 0..5)),
    )
        .prop_map(|(mut payload, itinerary)| {
            payload.itinerary = itinerary;
            payload
        })
}

/// Plans reachable by merging arbitrary payloads into a fresh plan
fn arb_reachable_plan() -> impl Strategy<Value = Plan> {
    proptest::collection::vec(arb_any_payload(), 0..8).prop_map(|payloads| {
        payloads
            .iter()
            .fold(Plan::new("prop"), |plan, payload| merge(&plan, payload).unwrap_or(plan))
    })
}

fn is_contiguous(itinerary: &[ItineraryDay]) -> bool {
    itinerary
        .iter()
        .enumerate()
        .all(|(i, day)| day.day as usize == i + 1)
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Itinerary days are always 1..=N no matter what numbers the chunks carry
    #[test]
    fn prop_itinerary_always_contiguous(
        chunks in proptest::collection::vec(
            proptest::collection::vec(arb_itinerary_day(), 0..6),
            0..6
        )
    ) {
        let mut plan = Plan::new("prop");
        plan.route = vec![CityStop::new("Paris", "France", 3)];
        let total: usize = chunks.iter().map(Vec::len).sum();

        for chunk in chunks {
            let payload = UpdatePayload {
                itinerary: Some(chunk),
                ..Default::default()
            };
            plan = merge(&plan, &payload).unwrap();
            prop_assert!(is_contiguous(&plan.itinerary), "gap or repeat: {:?}", plan.itinerary);
        }
        prop_assert_eq!(plan.itinerary.len(), total);
    }

    // Merging the same list payload twice equals merging it once
    #[test]
    fn prop_list_merge_idempotent(start in arb_reachable_plan(), payload in arb_list_payload()) {
        let once = merge(&start, &payload).unwrap();
        let twice = merge(&once, &payload).unwrap();
        prop_assert_eq!(once, twice);
    }

    // Existing list elements keep their order; nothing is ever dropped
    #[test]
    fn prop_merge_preserves_existing_lists(start in arb_reachable_plan(), payload in arb_any_payload()) {
        let merged = merge(&start, &payload).unwrap();
        prop_assert!(merged.interests.starts_with(&start.interests));
        prop_assert!(merged.route.starts_with(&start.route));
        prop_assert!(merged.flights.starts_with(&start.flights));
        prop_assert!(merged.accommodation.starts_with(&start.accommodation));
        prop_assert!(merged.itinerary.starts_with(&start.itinerary));
        prop_assert!(merged.budget.starts_with(&start.budget));
    }

    // Every reachable plan maps to exactly one category, and an empty route
    // never asks to plan a city
    #[test]
    fn prop_router_total(plan in arb_reachable_plan()) {
        let category = route(&plan);
        if plan.route.is_empty() {
            prop_assert_eq!(category, ActionCategory::DefineRoute);
        } else {
            match category {
                ActionCategory::PlanCurrentCity { index, ref stop, .. } => {
                    prop_assert!(index < plan.route_len());
                    prop_assert_eq!(stop, &plan.route[index as usize]);
                }
                ActionCategory::Finalize { .. } => {
                    prop_assert_eq!(plan.current_city_index, plan.route_len());
                    prop_assert!(!plan.is_complete());
                }
                ActionCategory::Terminal => {
                    prop_assert!(plan.is_complete() || plan.current_city_index > plan.route_len());
                }
                ActionCategory::DefineRoute => prop_assert!(false, "non-empty route classified as DefineRoute"),
            }
        }
    }

    // A complete plan's structure never changes again
    #[test]
    fn prop_terminal_lock(start in arb_reachable_plan(), payloads in proptest::collection::vec(arb_any_payload(), 1..6)) {
        let mut plan = start;
        plan.status = PlanStatus::Complete;
        let frozen = plan.clone();

        for payload in payloads {
            plan = merge(&plan, &payload).unwrap();
            prop_assert_eq!(&plan.route, &frozen.route);
            prop_assert_eq!(&plan.itinerary, &frozen.itinerary);
            prop_assert_eq!(plan.current_city_index, frozen.current_city_index);
            prop_assert_eq!(plan.status, PlanStatus::Complete);
        }
    }

    // The payload that completes a plan cannot change its structure either
    #[test]
    fn prop_completing_payload_freezes_structure(start in arb_reachable_plan(), payload in arb_any_payload()) {
        let payload = UpdatePayload {
            status: Some(PlanStatus::Complete),
            ..payload
        };
        let merged = merge(&start, &payload).unwrap();
        prop_assert_eq!(&merged.route, &start.route);
        prop_assert_eq!(&merged.itinerary, &start.itinerary);
        prop_assert_eq!(merged.current_city_index, start.current_city_index);
        prop_assert!(merged.is_complete());
    }

    // Guarded index updates never move backwards or past the route
    #[test]
    fn prop_guarded_index_monotonic(
        route_stops in proptest::collection::vec(arb_city_stop(), 1..5),
        requests in proptest::collection::vec(0u32..7, 0..20)
    ) {
        let mut plan = Plan::new("prop");
        plan.route = route_stops;

        for index in requests {
            let payload = UpdatePayload {
                current_city_index: Some(index),
                ..Default::default()
            };
            if guard_update(&plan, &payload).is_ok() {
                let next = merge(&plan, &payload).unwrap();
                prop_assert!(next.current_city_index >= plan.current_city_index);
                prop_assert!(next.current_city_index <= next.route_len());
                plan = next;
            }
        }
    }
}
