//! Trait abstractions for runtime I/O
//!
//! The executor only talks to the reasoning model, the plan store and the
//! tools through these traits, so turns can be driven by mocks in tests.

use crate::db::{Database, DbError};
use crate::llm::{
    LlmError, LlmMessage, LlmRequest, ModelRegistry, SystemContent, ToolDefinition,
};
use crate::plan::Plan;
use crate::state_machine::state::UPDATE_PLAN_TOOL;
use crate::state_machine::{ToolCall, ToolInput};
use crate::system_prompt::build_system_prompt;
use crate::tools::{Observation, ToolConfig, ToolContext, ToolRegistry};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const DECISION_MAX_TOKENS: u32 = 8192;

/// One answer from the reasoning model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    pub text: String,
    pub calls: Vec<ToolCall>,
}

#[cfg(test)]
impl Decision {
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: vec![],
        }
    }

    pub fn calls(calls: Vec<ToolCall>) -> Self {
        Self {
            text: String::new(),
            calls,
        }
    }
}

/// Chooses the next step of a turn
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Decide on the next tool calls, or answer with none
    async fn decide(&self, history: &[LlmMessage], plan: &Plan) -> Result<Decision, LlmError>;
}

/// Plan store failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("plan for session {session_key} was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        session_key: String,
        expected: u64,
        found: u64,
    },
    #[error("plan store failed: {0}")]
    Backend(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::VersionConflict {
                session_key,
                expected,
                found,
            } => StoreError::Conflict {
                session_key,
                expected,
                found,
            },
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Durable plan storage.
///
/// `save` only succeeds when the stored version still equals `plan.version`.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Load the plan, creating an empty one on first access
    async fn load(&self, session_key: &str) -> Result<Plan, StoreError>;

    /// Store the plan and return its new version
    async fn save(&self, session_key: &str, plan: &Plan) -> Result<u64, StoreError>;
}

/// Runs the external tool calls of one decision
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// One observation per call, in request order
    async fn execute(
        &self,
        session_key: &str,
        calls: &[ToolCall],
        cancel: CancellationToken,
    ) -> Vec<Observation>;

    /// Get tool definitions for the reasoning model
    fn definitions(&self) -> Vec<ToolDefinition>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Reasoner + ?Sized> Reasoner for Arc<T> {
    async fn decide(&self, history: &[LlmMessage], plan: &Plan) -> Result<Decision, LlmError> {
        (**self).decide(history, plan).await
    }
}

#[async_trait]
impl<T: PlanStore + ?Sized> PlanStore for Arc<T> {
    async fn load(&self, session_key: &str) -> Result<Plan, StoreError> {
        (**self).load(session_key).await
    }

    async fn save(&self, session_key: &str, plan: &Plan) -> Result<u64, StoreError> {
        (**self).save(session_key, plan).await
    }
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn execute(
        &self,
        session_key: &str,
        calls: &[ToolCall],
        cancel: CancellationToken,
    ) -> Vec<Observation> {
        (**self).execute(session_key, calls, cancel).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        (**self).definitions()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Definition of the internal plan update tool
pub fn update_plan_definition() -> ToolDefinition {
    let city = json!({
        "type": "object",
        "required": ["city", "country", "num_days"],
        "properties": {
            "city": {"type": "string"},
            "country": {"type": "string"},
            "num_days": {"type": "integer", "minimum": 1, "maximum": 365}
        }
    });
    let day = json!({
        "type": "object",
        "required": ["day"],
        "properties": {
            "day": {"type": "integer"},
            "title": {"type": "string"},
            "activities": {"type": "array", "items": {"type": "string"}},
            "meals": {"description": "Object keyed by meal, or a one-line summary"}
        }
    });
    let budget = json!({
        "type": "object",
        "required": ["category", "estimated_cost", "currency"],
        "properties": {
            "category": {"type": "string"},
            "estimated_cost": {"type": "number"},
            "currency": {"type": "string"}
        }
    });

    ToolDefinition {
        name: UPDATE_PLAN_TOOL.to_string(),
        description: "Updates the trip plan. Only the fields you send are changed; \
                      list fields are appended without duplicates and itinerary days \
                      are renumbered to follow the existing ones."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "origin_city": {"type": "string"},
                "origin_airport_code": {"type": "string"},
                "destination_airport_code": {"type": "string"},
                "destination": {"type": "string"},
                "duration_days": {"type": "integer", "minimum": 1},
                "interests": {"type": "array", "items": {"type": "string"}},
                "route": {"type": "array", "items": city},
                "current_city_index": {"type": "integer", "minimum": 0},
                "flights": {"type": "array", "items": {"type": "object"}},
                "accommodation": {"type": "array", "items": {"type": "object"}},
                "itinerary": {"type": "array", "items": day},
                "budget": {"type": "array", "items": budget},
                "status": {"type": "string", "enum": ["planning", "complete"]}
            }
        }),
    }
}

/// Adapter to use the default model of a [`ModelRegistry`] as [`Reasoner`]
pub struct LlmReasoner {
    registry: Arc<ModelRegistry>,
    tools: Vec<ToolDefinition>,
}

impl LlmReasoner {
    /// `tools` are the external tools; `update_plan` is added here
    pub fn new(registry: Arc<ModelRegistry>, mut tools: Vec<ToolDefinition>) -> Self {
        tools.push(update_plan_definition());
        Self { registry, tools }
    }
}

#[async_trait]
impl Reasoner for LlmReasoner {
    async fn decide(&self, history: &[LlmMessage], plan: &Plan) -> Result<Decision, LlmError> {
        let llm = self
            .registry
            .default()
            .ok_or_else(|| LlmError::unavailable("No LLM configured"))?;

        let request = LlmRequest {
            system: vec![SystemContent::new(build_system_prompt(plan))],
            messages: history.to_vec(),
            tools: self.tools.clone(),
            max_tokens: Some(DECISION_MAX_TOKENS),
        };
        let response = llm.complete(&request).await?;

        let calls = response
            .tool_uses()
            .into_iter()
            .map(|(id, name, input)| {
                ToolCall::new(id, ToolInput::from_name_and_value(name, input.clone()))
            })
            .collect();

        Ok(Decision {
            text: response.text(),
            calls,
        })
    }
}

/// Adapter to use [`Database`] as [`PlanStore`]
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PlanStore for DatabaseStore {
    async fn load(&self, session_key: &str) -> Result<Plan, StoreError> {
        Ok(self.db.load_or_create(session_key)?)
    }

    async fn save(&self, session_key: &str, plan: &Plan) -> Result<u64, StoreError> {
        if plan.session_key == session_key {
            return Ok(self.db.save_plan(plan)?);
        }
        let mut keyed = plan.clone();
        keyed.session_key = session_key.to_string();
        Ok(self.db.save_plan(&keyed)?)
    }
}

/// Adapter to use [`ToolRegistry`] as [`ToolExecutor`]
pub struct ToolRegistryExecutor {
    registry: Arc<ToolRegistry>,
    http: reqwest::Client,
    config: Arc<ToolConfig>,
    llm_registry: Arc<ModelRegistry>,
    timeout: Duration,
}

impl ToolRegistryExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        config: Arc<ToolConfig>,
        llm_registry: Arc<ModelRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            http: reqwest::Client::new(),
            config,
            llm_registry,
            timeout,
        }
    }

    fn context(&self, session_key: &str, cancel: &CancellationToken) -> ToolContext {
        ToolContext::new(
            cancel.clone(),
            session_key.to_string(),
            self.http.clone(),
            Arc::clone(&self.config),
            Arc::clone(&self.llm_registry),
        )
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistryExecutor {
    async fn execute(
        &self,
        session_key: &str,
        calls: &[ToolCall],
        cancel: CancellationToken,
    ) -> Vec<Observation> {
        // join_all keeps request order
        let runs = calls.iter().map(|call| {
            let input: Value = call.input.to_value();
            self.registry.dispatch(
                &call.id,
                call.name(),
                input,
                self.context(session_key, &cancel),
                self.timeout,
            )
        });
        futures::future::join_all(runs).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }
}
