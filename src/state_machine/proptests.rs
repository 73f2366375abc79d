//! Property-based tests for the turn state machine
//!
//! These tests verify key invariants hold across arbitrary decision sequences.

use super::state::*;
use super::transition::*;
use super::*;
use crate::llm::LlmErrorKind;
use crate::plan::{route, ActionCategory, CityStop, ItineraryDay, Plan, PlanStatus, UpdatePayload};
use crate::tools::Observation;
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context(max_steps: u32) -> TurnContext {
    TurnContext::new("prop-session", max_steps)
}

fn planned_plan() -> Plan {
    let mut plan = Plan::new("prop-session");
    plan.route = vec![
        CityStop::new("Paris", "France", 2),
        CityStop::new("Rome", "Italy", 2),
    ];
    plan
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_update() -> impl Strategy<Value = UpdatePayload> {
    prop_oneof![
        (0u32..4).prop_map(|index| UpdatePayload {
            current_city_index: Some(index),
            ..Default::default()
        }),
        proptest::collection::vec(1u32..9, 1..4).prop_map(|days| UpdatePayload {
            itinerary: Some(days.into_iter().map(|d| ItineraryDay::new(d, "Sights")).collect()),
            ..Default::default()
        }),
        Just(UpdatePayload {
            status: Some(PlanStatus::Complete),
            ..Default::default()
        }),
        "[A-Z][a-z]{3,8}".prop_map(|destination| UpdatePayload {
            destination: Some(destination),
            ..Default::default()
        }),
    ]
}

fn arb_tool_call() -> impl Strategy<Value = ToolCall> {
    prop_oneof![
        ("[a-z]{8}", arb_update()).prop_map(|(id, payload)| ToolCall::update(id, payload)),
        ("[a-z]{8}", prop_oneof![Just("weather_info"), Just("calculator")])
            .prop_map(|(id, name)| ToolCall::external(id, name, json!({}))),
        "[a-z]{8}".prop_map(|id| {
            ToolCall::new(
                id,
                ToolInput::from_name_and_value("update_plan", json!({"bogus": true})),
            )
        }),
    ]
}

fn arb_retryable_kind() -> impl Strategy<Value = LlmErrorKind> {
    prop_oneof![
        Just(LlmErrorKind::Network),
        Just(LlmErrorKind::RateLimit),
        Just(LlmErrorKind::ServerError),
    ]
}

fn arb_any_kind() -> impl Strategy<Value = LlmErrorKind> {
    prop_oneof![
        arb_retryable_kind(),
        Just(LlmErrorKind::Auth),
        Just(LlmErrorKind::InvalidRequest),
        Just(LlmErrorKind::Unknown),
    ]
}

/// Drive one decision through the machine, answering any dispatch with
/// successful observations. Returns the final state of that step.
fn drive_decision(
    state: TurnState,
    plan: &mut Plan,
    ctx: &TurnContext,
    calls: Vec<ToolCall>,
) -> (TurnState, Vec<Effect>) {
    let result = transition(
        &state,
        plan,
        ctx,
        Event::Decision {
            text: String::new(),
            calls,
        },
    )
    .unwrap();
    let mut effects = result.effects;
    if let Some(next) = result.plan {
        *plan = next;
    }

    if let TurnState::Dispatching { calls, .. } = &result.new_state {
        let observations = calls
            .iter()
            .filter(|c| c.input.is_external())
            .map(|c| Observation::success(&c.id, "{}"))
            .collect();
        let done = transition(
            &result.new_state,
            plan,
            ctx,
            Event::ToolsComplete { observations },
        )
        .unwrap();
        if let Some(next) = done.plan {
            *plan = next;
        }
        effects.extend(done.effects);
        return (done.new_state, effects);
    }

    (result.new_state, effects)
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    // The loop always stops within the step budget, and steps only go up
    #[test]
    fn prop_turn_bounded_by_max_steps(
        max_steps in 1u32..8,
        decisions in proptest::collection::vec(proptest::collection::vec(arb_tool_call(), 1..4), 1..12)
    ) {
        let ctx = test_context(max_steps);
        let mut plan = planned_plan();
        let mut state = TurnState::start();
        let mut last_step = 0;

        for calls in decisions {
            if state.is_terminal() {
                break;
            }
            let TurnState::Deciding { step, .. } = state else {
                prop_assert!(false, "expected deciding, got {:?}", state);
                unreachable!();
            };
            prop_assert!(step > last_step);
            prop_assert!(step <= max_steps);
            last_step = step;

            let (next, _) = drive_decision(state, &mut plan, &ctx, calls);
            state = next;
        }

        if let TurnState::Exhausted { steps } = state {
            prop_assert_eq!(steps, max_steps);
        }
    }

    // Observations come back one per call, in request order
    #[test]
    fn prop_observations_follow_request_order(calls in proptest::collection::vec(arb_tool_call(), 1..6)) {
        let ctx = test_context(50);
        let mut plan = planned_plan();
        let expected: Vec<String> = calls.iter().map(|c| c.id.clone()).collect();

        let (_, effects) = drive_decision(TurnState::start(), &mut plan, &ctx, calls);
        let observed: Vec<String> = effects
            .iter()
            .find_map(|e| match e {
                Effect::RecordObservations { observations } => {
                    Some(observations.iter().map(|o| o.tool_use_id.clone()).collect())
                }
                _ => None,
            })
            .unwrap();
        prop_assert_eq!(observed, expected);
    }

    // PersistPlan is emitted exactly when the plan changed
    #[test]
    fn prop_persist_only_on_change(calls in proptest::collection::vec(arb_tool_call(), 1..6)) {
        let ctx = test_context(50);
        let before = planned_plan();
        let mut plan = before.clone();

        let (_, effects) = drive_decision(TurnState::start(), &mut plan, &ctx, calls);
        let persisted = effects.contains(&Effect::PersistPlan);
        prop_assert_eq!(persisted, plan != before);
    }

    // The city index never decreases, never passes the route and moves at
    // most one city per update
    #[test]
    fn prop_index_monotonic_within_turn(
        decisions in proptest::collection::vec(proptest::collection::vec(arb_tool_call(), 1..4), 1..15)
    ) {
        let ctx = test_context(50);
        let mut plan = planned_plan();
        let mut state = TurnState::start();

        for calls in decisions {
            if state.is_terminal() {
                break;
            }
            let before = plan.current_city_index;
            let updates = calls.len() as u32;
            let (next, _) = drive_decision(state, &mut plan, &ctx, calls);
            prop_assert!(plan.current_city_index >= before);
            prop_assert!(plan.current_city_index <= before + updates);
            prop_assert!(plan.current_city_index <= plan.route_len());
            state = next;
        }
    }

    // Completion is only ever accepted from the finalize stage
    #[test]
    fn prop_complete_only_after_all_cities(
        decisions in proptest::collection::vec(proptest::collection::vec(arb_tool_call(), 1..4), 1..15)
    ) {
        let ctx = test_context(50);
        let mut plan = planned_plan();
        let mut state = TurnState::start();

        for calls in decisions {
            if state.is_terminal() {
                break;
            }
            let was_complete = plan.is_complete();
            let stage = route(&plan);
            let (next, _) = drive_decision(state, &mut plan, &ctx, calls);
            if plan.is_complete() && !was_complete {
                prop_assert!(
                    matches!(stage, ActionCategory::Finalize { .. })
                        || plan.current_city_index == plan.route_len(),
                    "completed before all cities were planned"
                );
            }
            state = next;
        }
    }

    // Retryable failures never outlast the retry limit
    #[test]
    fn prop_retries_bounded(kinds in proptest::collection::vec(arb_any_kind(), 1..8)) {
        let ctx = test_context(50);
        let plan = planned_plan();
        let mut state = TurnState::start();
        let mut retries = 0;

        for kind in kinds {
            let TurnState::Deciding { attempt, .. } = state else { break };
            let result = transition(
                &state,
                &plan,
                &ctx,
                Event::DecisionFailed { message: "boom".into(), kind, attempt, retry_after: None },
            )
            .unwrap();
            if result.effects.iter().any(|e| matches!(e, Effect::ScheduleRetry { .. })) {
                retries += 1;
                prop_assert!(kind.is_retryable());
            }
            state = result.new_state;
        }

        prop_assert!(retries < MAX_RETRY_ATTEMPTS);
    }

    // Cancel is accepted from every live state and terminal states accept nothing
    #[test]
    fn prop_cancel_from_live_states(
        step in 1u32..50,
        attempt in 1u32..4,
        calls in proptest::collection::vec(arb_tool_call(), 0..3),
        kind in arb_retryable_kind()
    ) {
        let ctx = test_context(50);
        let plan = planned_plan();
        for state in [
            TurnState::Deciding { step, attempt },
            TurnState::Dispatching { step, calls: calls.clone() },
        ] {
            let result = transition(&state, &plan, &ctx, Event::Cancel).unwrap();
            prop_assert_eq!(result.new_state, TurnState::Cancelled);
            prop_assert!(result.plan.is_none());
        }

        for terminal in [
            TurnState::Cancelled,
            TurnState::Done { answer: "ok".into() },
            TurnState::Exhausted { steps: step },
            TurnState::Failed { message: "x".into() },
        ] {
            let event = Event::DecisionFailed { message: "late".into(), kind, attempt, retry_after: None };
            prop_assert!(transition(&terminal, &plan, &ctx, event).is_err());
        }
    }
}
