//! Turn executor
//!
//! Drives the pure transition function and performs its effects: asking the
//! reasoner, running tools, persisting the plan and waiting out retries.

use super::traits::{PlanStore, Reasoner, ToolExecutor};
use super::OrchestratorError;

use crate::llm::{ContentBlock, LlmError, LlmMessage};
use crate::plan::{route, Plan};
use crate::state_machine::state::TurnContext;
use crate::state_machine::transition::{COMPLETE_ANSWER, UPDATED_ANSWER};
use crate::state_machine::{transition, Effect, Event, ToolCall, TransitionError, TurnState};
use crate::tools::Observation;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of one turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub answer: String,
    pub plan: Plan,
    /// Set when the turn stopped before the model finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Executes one turn against any reasoner, store and tool implementation
pub struct TurnRunner<R, S, T>
where
    R: Reasoner,
    S: PlanStore,
    T: ToolExecutor,
{
    context: TurnContext,
    state: TurnState,
    plan: Plan,
    history: Vec<LlmMessage>,
    reasoner: R,
    store: S,
    tools: T,
    decision_timeout: Duration,
    cancel: CancellationToken,
}

impl<R, S, T> TurnRunner<R, S, T>
where
    R: Reasoner,
    S: PlanStore,
    T: ToolExecutor,
{
    pub fn new(
        context: TurnContext,
        plan: Plan,
        reasoner: R,
        store: S,
        tools: T,
        decision_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            context,
            state: TurnState::start(),
            plan,
            history: Vec::new(),
            reasoner,
            store,
            tools,
            decision_timeout,
            cancel,
        }
    }

    /// Run the turn for `query` until a terminal state
    pub async fn run(mut self, query: &str) -> Result<TurnOutcome, OrchestratorError> {
        tracing::info!(session = %self.context.session_key, "Starting turn");
        self.history
            .push(LlmMessage::user(vec![ContentBlock::text(query)]));

        let mut event = self.request_decision().await;
        loop {
            let result = transition(&self.state, &self.plan, &self.context, event)?;
            self.state = result.new_state;
            if let Some(plan) = result.plan {
                self.plan = plan;
            }

            let mut next = None;
            for effect in result.effects {
                if let Some(generated) = self.execute_effect(effect).await? {
                    next = Some(generated);
                }
            }

            if self.state.is_terminal() {
                break;
            }
            event = next.ok_or_else(|| {
                OrchestratorError::Transition(
                    TransitionError::InvalidTransition(format!(
                        "{} produced no follow-up event",
                        self.state.name()
                    )),
                )
            })?;
        }

        tracing::info!(
            session = %self.context.session_key,
            state = self.state.name(),
            version = self.plan.version,
            "Turn finished"
        );
        self.finish()
    }

    fn finish(self) -> Result<TurnOutcome, OrchestratorError> {
        match self.state {
            TurnState::Done { answer } => Ok(TurnOutcome {
                answer,
                plan: self.plan,
                note: None,
            }),
            TurnState::Exhausted { steps } => {
                let answer = if self.plan.is_complete() {
                    COMPLETE_ANSWER
                } else {
                    UPDATED_ANSWER
                };
                Ok(TurnOutcome {
                    answer: answer.to_string(),
                    plan: self.plan,
                    note: Some(format!(
                        "Stopped after {steps} steps; the plan may be incomplete."
                    )),
                })
            }
            TurnState::Failed { message } => Err(OrchestratorError::Reasoning(message)),
            TurnState::Cancelled => Err(OrchestratorError::Cancelled),
            other => Err(OrchestratorError::Transition(
                TransitionError::InvalidTransition(format!(
                    "turn stopped in {}",
                    other.name()
                )),
            )),
        }
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, OrchestratorError> {
        match effect {
            Effect::RequestDecision => Ok(Some(self.request_decision().await)),

            Effect::DispatchTools { calls } => {
                if self.cancel.is_cancelled() {
                    return Ok(Some(Event::Cancel));
                }
                tracing::debug!(
                    session = %self.context.session_key,
                    step = self.step(),
                    tools = calls.len(),
                    "Dispatching tools"
                );
                let observations = self
                    .tools
                    .execute(&self.context.session_key, &calls, self.cancel.clone())
                    .await;
                Ok(Some(Event::ToolsComplete { observations }))
            }

            Effect::RecordAssistant { text, calls } => {
                let blocks = assistant_blocks(&text, &calls);
                if !blocks.is_empty() {
                    self.history.push(LlmMessage::assistant(blocks));
                }
                Ok(None)
            }

            Effect::RecordObservations { observations } => {
                if !observations.is_empty() {
                    self.history
                        .push(LlmMessage::user(observation_blocks(observations)));
                }
                Ok(None)
            }

            Effect::PersistPlan => {
                let version = self
                    .store
                    .save(&self.context.session_key, &self.plan)
                    .await?;
                self.plan.version = version;
                tracing::debug!(
                    session = %self.context.session_key,
                    version,
                    index = self.plan.current_city_index,
                    "Plan persisted"
                );
                Ok(None)
            }

            Effect::ScheduleRetry { delay, attempt } => {
                tracing::warn!(
                    session = %self.context.session_key,
                    attempt,
                    delay_ms = delay.as_millis(),
                    "Retrying decision"
                );
                tokio::select! {
                    () = self.cancel.cancelled() => Ok(Some(Event::Cancel)),
                    () = tokio::time::sleep(delay) => Ok(Some(Event::RetryTimeout { attempt })),
                }
            }
        }
    }

    /// Ask the reasoner, bounded by the decision timeout and cancellation
    async fn request_decision(&self) -> Event {
        let attempt = match self.state {
            TurnState::Deciding { attempt, .. } => attempt,
            _ => 1,
        };

        let decision = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Event::Cancel,
            result = tokio::time::timeout(
                self.decision_timeout,
                self.reasoner.decide(&self.history, &self.plan),
            ) => result,
        };

        match decision {
            Ok(Ok(decision)) => {
                tracing::debug!(
                    session = %self.context.session_key,
                    step = self.step(),
                    calls = decision.calls.len(),
                    next_action = route(&self.plan).name(),
                    "Decision received"
                );
                Event::Decision {
                    text: decision.text,
                    calls: decision.calls,
                }
            }
            Ok(Err(e)) => decision_failed(e, attempt),
            Err(_) => decision_failed(LlmError::timeout(self.decision_timeout), attempt),
        }
    }

    fn step(&self) -> u32 {
        match self.state {
            TurnState::Deciding { step, .. } | TurnState::Dispatching { step, .. } => step,
            _ => 0,
        }
    }
}

fn decision_failed(error: LlmError, attempt: u32) -> Event {
    Event::DecisionFailed {
        message: error.message,
        kind: error.kind,
        attempt,
        retry_after: error.retry_after,
    }
}

fn assistant_blocks(text: &str, calls: &[ToolCall]) -> Vec<ContentBlock> {
    let mut blocks = Vec::with_capacity(calls.len() + 1);
    if !text.trim().is_empty() {
        blocks.push(ContentBlock::text(text));
    }
    blocks.extend(
        calls
            .iter()
            .map(|c| ContentBlock::tool_use(&c.id, c.name(), c.input.to_value())),
    );
    blocks
}

fn observation_blocks(observations: Vec<Observation>) -> Vec<ContentBlock> {
    observations
        .into_iter()
        .map(|o| ContentBlock::tool_result(o.tool_use_id, o.content, o.is_error))
        .collect()
}
