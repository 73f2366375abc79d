//! Turn state types

use crate::plan::{UpdatePayload, ValidationError};
use serde_json::Value;

/// Name of the internal tool that carries plan updates
pub const UPDATE_PLAN_TOOL: &str = "update_plan";

/// Older prompt variants call the update tool by its class name
const UPDATE_PLAN_ALIASES: &[&str] = &[UPDATE_PLAN_TOOL, "PlanUpdater"];

// ============================================================================
// Tool Input Types
// ============================================================================

/// Typed tool input
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    /// Internal plan update, already validated against the plan schema
    UpdatePlan(UpdatePayload),
    /// Plan update whose payload failed validation
    InvalidUpdate { input: Value, error: ValidationError },
    /// Any capability served by the tool registry
    External { name: String, input: Value },
}

impl ToolInput {
    pub fn tool_name(&self) -> &str {
        match self {
            ToolInput::UpdatePlan(_) | ToolInput::InvalidUpdate { .. } => UPDATE_PLAN_TOOL,
            ToolInput::External { name, .. } => name,
        }
    }

    /// Whether the call is served by the tool registry rather than the merge engine
    pub fn is_external(&self) -> bool {
        matches!(self, ToolInput::External { .. })
    }

    /// Convert back to JSON for the conversation history
    pub fn to_value(&self) -> Value {
        match self {
            ToolInput::UpdatePlan(payload) => serde_json::to_value(payload).unwrap_or(Value::Null),
            ToolInput::InvalidUpdate { input, .. } | ToolInput::External { input, .. } => {
                input.clone()
            }
        }
    }

    /// Parse from tool name and JSON value
    pub fn from_name_and_value(name: &str, value: Value) -> Self {
        if UPDATE_PLAN_ALIASES.contains(&name) {
            match UpdatePayload::from_value(value.clone()) {
                Ok(payload) => ToolInput::UpdatePlan(payload),
                Err(error) => ToolInput::InvalidUpdate {
                    input: value,
                    error,
                },
            }
        } else {
            ToolInput::External {
                name: name.to_string(),
                input: value,
            }
        }
    }
}

// ============================================================================
// Tool Call - A tool invocation with ID and typed input
// ============================================================================

/// A tool call from the reasoning model with typed input
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub input: ToolInput,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, input: ToolInput) -> Self {
        Self {
            id: id.into(),
            input,
        }
    }

    pub fn update(id: impl Into<String>, payload: UpdatePayload) -> Self {
        Self::new(id, ToolInput::UpdatePlan(payload))
    }

    pub fn external(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::new(
            id,
            ToolInput::External {
                name: name.into(),
                input,
            },
        )
    }

    pub fn name(&self) -> &str {
        self.input.tool_name()
    }
}

// ============================================================================
// Turn State
// ============================================================================

/// State of one orchestrator turn
#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    /// Waiting on the reasoning model for decision number `step`
    Deciding { step: u32, attempt: u32 },

    /// External tools from decision `step` are running
    Dispatching { step: u32, calls: Vec<ToolCall> },

    /// The model answered without tool calls
    Done { answer: String },

    /// Step budget used up; the plan is returned as assembled so far
    Exhausted { steps: u32 },

    /// The reasoning model failed for good
    Failed { message: String },

    /// Caller went away
    Cancelled,
}

impl TurnState {
    /// Initial state of every turn
    pub fn start() -> Self {
        TurnState::Deciding {
            step: 1,
            attempt: 1,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnState::Done { .. }
                | TurnState::Exhausted { .. }
                | TurnState::Failed { .. }
                | TurnState::Cancelled
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TurnState::Deciding { .. } => "deciding",
            TurnState::Dispatching { .. } => "dispatching",
            TurnState::Done { .. } => "done",
            TurnState::Exhausted { .. } => "exhausted",
            TurnState::Failed { .. } => "failed",
            TurnState::Cancelled => "cancelled",
        }
    }
}

/// Default number of decisions per turn
pub const DEFAULT_MAX_STEPS: u32 = 50;

/// Immutable configuration for a turn
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session_key: String,
    pub max_steps: u32,
}

impl TurnContext {
    pub fn new(session_key: impl Into<String>, max_steps: u32) -> Self {
        Self {
            session_key: session_key.into(),
            max_steps: max_steps.max(1),
        }
    }
}
