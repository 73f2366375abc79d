//! Pure state transition function
//!
//! Given the turn state, the current plan and an event, decide the next state,
//! the plan it produces and the effects to run. Plan updates are merged here,
//! in request order, so plan evolution needs no I/O to test.

use super::state::{ToolCall, ToolInput, TurnContext, TurnState};
use super::{Effect, Event};
use crate::plan::{guard_update, merge, Plan, UpdatePayload, ValidationError};
use crate::tools::Observation;
use std::time::Duration;
use thiserror::Error;

pub const MAX_RETRY_ATTEMPTS: u32 = 3;

pub const COMPLETE_ANSWER: &str = "I have finished planning your trip. Please see the details below.";
pub const UPDATED_ANSWER: &str = "I have updated the plan with the new information.";

const UPDATE_APPLIED: &str = "Successfully updated the plan.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    /// Replacement plan when this transition merged updates
    pub plan: Option<Plan>,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            plan: None,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn with_plan(mut self, plan: Option<Plan>) -> Self {
        self.plan = plan;
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("Turn already finished ({0})")]
    TurnFinished(&'static str),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &TurnState,
    plan: &Plan,
    ctx: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    if state.is_terminal() {
        return Err(TransitionError::TurnFinished(state.name()));
    }

    match (state, event) {
        // ============================================================
        // Decisions
        // ============================================================

        // No tool calls: the model has answered
        (TurnState::Deciding { .. }, Event::Decision { text, calls }) if calls.is_empty() => {
            let answer = final_answer(&text, plan);
            Ok(TransitionResult::new(TurnState::Done { answer })
                .with_effect(Effect::record_assistant(text, vec![])))
        }

        // Only plan updates: merge right away and ask again
        (TurnState::Deciding { step, .. }, Event::Decision { text, calls })
            if !calls.iter().any(|c| c.input.is_external()) =>
        {
            let (next_plan, observations) = apply_calls(plan, &calls, &[]);
            let result = TransitionResult::new(TurnState::Deciding {
                step: *step,
                attempt: 1,
            })
            .with_effect(Effect::record_assistant(text, calls));
            Ok(complete_step(result, *step, ctx, plan, next_plan, observations))
        }

        // External tools requested: run them, merge once all are back
        (TurnState::Deciding { step, .. }, Event::Decision { text, calls }) => {
            let external: Vec<ToolCall> = calls
                .iter()
                .filter(|c| c.input.is_external())
                .cloned()
                .collect();
            Ok(TransitionResult::new(TurnState::Dispatching {
                step: *step,
                calls: calls.clone(),
            })
            .with_effect(Effect::record_assistant(text, calls))
            .with_effect(Effect::dispatch(external)))
        }

        // ============================================================
        // Reasoning failures
        // ============================================================
        (
            TurnState::Deciding { step, .. },
            Event::DecisionFailed {
                message,
                kind,
                attempt,
                retry_after,
            },
        ) => {
            if kind.is_retryable() && attempt < MAX_RETRY_ATTEMPTS {
                let next = attempt + 1;
                let delay = retry_delay(attempt).max(retry_after.unwrap_or_default());
                Ok(TransitionResult::new(TurnState::Deciding {
                    step: *step,
                    attempt: next,
                })
                .with_effect(Effect::ScheduleRetry {
                    delay,
                    attempt: next,
                }))
            } else {
                Ok(TransitionResult::new(TurnState::Failed { message }))
            }
        }

        (TurnState::Deciding { step, attempt }, Event::RetryTimeout { attempt: retry }) => {
            if retry != *attempt {
                return Err(TransitionError::InvalidTransition(format!(
                    "stale retry {retry} while on attempt {attempt}"
                )));
            }
            Ok(TransitionResult::new(TurnState::Deciding {
                step: *step,
                attempt: *attempt,
            })
            .with_effect(Effect::RequestDecision))
        }

        // ============================================================
        // Tool completion
        // ============================================================
        (TurnState::Dispatching { step, calls }, Event::ToolsComplete { observations }) => {
            let (next_plan, observations) = apply_calls(plan, calls, &observations);
            Ok(complete_step(
                TransitionResult::new(TurnState::Deciding {
                    step: *step,
                    attempt: 1,
                }),
                *step,
                ctx,
                plan,
                next_plan,
                observations,
            ))
        }

        // ============================================================
        // Cancellation
        // ============================================================
        (_, Event::Cancel) => Ok(TransitionResult::new(TurnState::Cancelled)),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {} with event {}",
            state.name(),
            event_name(&event)
        ))),
    }
}

/// Finish a decision step: record observations, persist a changed plan and
/// either ask for the next decision or stop on the step budget.
fn complete_step(
    result: TransitionResult,
    step: u32,
    ctx: &TurnContext,
    before: &Plan,
    after: Plan,
    observations: Vec<Observation>,
) -> TransitionResult {
    let changed = after != *before;
    let mut result = result
        .with_effect(Effect::RecordObservations { observations })
        .with_plan(changed.then_some(after));
    if changed {
        result = result.with_effect(Effect::PersistPlan);
    }

    if step >= ctx.max_steps {
        result.new_state = TurnState::Exhausted { steps: step };
        result
    } else {
        result.new_state = TurnState::Deciding {
            step: step + 1,
            attempt: 1,
        };
        result.with_effect(Effect::RequestDecision)
    }
}

/// Walk the calls in request order, merging plan updates sequentially and
/// slotting in the observations of external calls.
fn apply_calls(
    plan: &Plan,
    calls: &[ToolCall],
    external: &[Observation],
) -> (Plan, Vec<Observation>) {
    let mut current = plan.clone();
    let mut observations = Vec::with_capacity(calls.len());

    for call in calls {
        let observation = match &call.input {
            ToolInput::UpdatePlan(payload) => match apply_update(&current, payload) {
                Ok(next) => {
                    current = next;
                    Observation::success(&call.id, UPDATE_APPLIED)
                }
                Err(e) => Observation::invalid_update(&call.id, &e),
            },
            ToolInput::InvalidUpdate { error, .. } => Observation::invalid_update(&call.id, error),
            ToolInput::External { name, .. } => external
                .iter()
                .find(|o| o.tool_use_id == call.id)
                .cloned()
                .unwrap_or_else(|| {
                    Observation::error(&call.id, format!("tool '{name}' returned no result"))
                }),
        };
        observations.push(observation);
    }

    (current, observations)
}

fn apply_update(plan: &Plan, payload: &UpdatePayload) -> Result<Plan, ValidationError> {
    guard_update(plan, payload)?;
    merge(plan, payload)
}

fn final_answer(text: &str, plan: &Plan) -> String {
    if !text.trim().is_empty() {
        text.to_string()
    } else if plan.is_complete() {
        COMPLETE_ANSWER.to_string()
    } else {
        UPDATED_ANSWER.to_string()
    }
}

/// 1s, 2s, 4s
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.saturating_sub(1).min(6))
}

fn event_name(event: &Event) -> &'static str {
    match event {
        Event::Decision { .. } => "decision",
        Event::DecisionFailed { .. } => "decision_failed",
        Event::RetryTimeout { .. } => "retry_timeout",
        Event::ToolsComplete { .. } => "tools_complete",
        Event::Cancel => "cancel",
    }
}
