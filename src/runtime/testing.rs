//! Mock implementations for testing
//!
//! These mocks drive whole turns without a model, a database or the network.

use super::traits::*;
use crate::llm::{LlmError, LlmMessage, ToolDefinition};
use crate::plan::Plan;
use crate::state_machine::ToolCall;
use crate::tools::{Observation, ToolOutput};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Scripted Reasoner
// ============================================================================

/// Reasoner that replays queued decisions
pub struct ScriptedReasoner {
    script: Mutex<VecDeque<Result<Decision, LlmError>>>,
    /// When the script runs dry, keep returning this decision
    fallback: Option<Decision>,
    delay: Option<Duration>,
    /// Plan and history length seen by each call
    pub calls: Mutex<Vec<(Plan, usize)>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, decision: Decision) -> Self {
        self.script.lock().unwrap().push_back(Ok(decision));
        self
    }

    pub fn then_fail(self, error: LlmError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    /// Repeat `decision` forever once the script is used up
    pub fn repeating(mut self, decision: Decision) -> Self {
        self.fallback = Some(decision);
        self
    }

    /// Sleep before every answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn seen_plans(&self) -> Vec<Plan> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(plan, _)| plan.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for ScriptedReasoner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn decide(&self, history: &[LlmMessage], plan: &Plan) -> Result<Decision, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((plan.clone(), history.len()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match (next, &self.fallback) {
            (Some(result), _) => result,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err(LlmError::invalid_request("script exhausted")),
        }
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

/// Tool executor with predefined outputs per tool name
pub struct MockToolExecutor {
    outputs: HashMap<String, ToolOutput>,
    delay: Option<Duration>,
    /// Record of executed calls as (name, input)
    pub executions: Mutex<Vec<(String, Value)>>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            delay: None,
            executions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tool(mut self, name: impl Into<String>, output: ToolOutput) -> Self {
        self.outputs.insert(name.into(), output);
        self
    }

    /// Every batch takes this long unless cancelled
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn recorded_executions(&self) -> Vec<(String, Value)> {
        self.executions.lock().unwrap().clone()
    }
}

impl Default for MockToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(
        &self,
        _session_key: &str,
        calls: &[ToolCall],
        cancel: CancellationToken,
    ) -> Vec<Observation> {
        {
            let mut executions = self.executions.lock().unwrap();
            for call in calls {
                executions.push((call.name().to_string(), call.input.to_value()));
            }
        }

        if let Some(delay) = self.delay {
            tokio::select! {
                () = cancel.cancelled() => {
                    return calls
                        .iter()
                        .map(|c| Observation::error(&c.id, "cancelled"))
                        .collect();
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        calls
            .iter()
            .map(|call| match self.outputs.get(call.name()) {
                Some(output) => Observation::from_output(&call.id, output.clone()),
                None => Observation::error(&call.id, format!("unknown tool '{}'", call.name())),
            })
            .collect()
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.outputs
            .keys()
            .map(|name| ToolDefinition {
                name: name.clone(),
                description: format!("Mock {name}"),
                input_schema: serde_json::json!({ "type": "object", "properties": {} }),
            })
            .collect()
    }
}

// ============================================================================
// In-Memory Plan Store
// ============================================================================

/// Plan store with the same version contract as the database
#[derive(Default)]
pub struct InMemoryPlanStore {
    plans: Mutex<HashMap<String, Plan>>,
    /// Number of successful saves
    pub saves: Mutex<u32>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(self, plan: Plan) -> Self {
        self.plans
            .lock()
            .unwrap()
            .insert(plan.session_key.clone(), plan);
        self
    }

    pub fn get(&self, session_key: &str) -> Option<Plan> {
        self.plans.lock().unwrap().get(session_key).cloned()
    }

    pub fn save_count(&self) -> u32 {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn load(&self, session_key: &str) -> Result<Plan, StoreError> {
        let mut plans = self.plans.lock().unwrap();
        let plan = plans.entry(session_key.to_string()).or_insert_with(|| {
            let mut plan = Plan::new(session_key);
            plan.version = 1;
            plan
        });
        Ok(plan.clone())
    }

    async fn save(&self, session_key: &str, plan: &Plan) -> Result<u64, StoreError> {
        let mut plans = self.plans.lock().unwrap();
        let found = plans.get(session_key).map_or(0, |p| p.version);
        if found != plan.version {
            return Err(StoreError::Conflict {
                session_key: session_key.to_string(),
                expected: plan.version,
                found,
            });
        }

        let mut stored = plan.clone();
        stored.version = found + 1;
        stored.session_key = session_key.to_string();
        plans.insert(session_key.to_string(), stored);
        *self.saves.lock().unwrap() += 1;
        Ok(found + 1)
    }
}
