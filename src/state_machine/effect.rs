//! Effects produced by state transitions

use crate::state_machine::state::ToolCall;
use crate::tools::Observation;
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Ask the reasoning model for its next decision
    RequestDecision,

    /// Run external tool calls; results come back as one `ToolsComplete`
    DispatchTools { calls: Vec<ToolCall> },

    /// Append the model's decision to the turn history
    RecordAssistant { text: String, calls: Vec<ToolCall> },

    /// Append tool observations to the turn history
    RecordObservations { observations: Vec<Observation> },

    /// Save the plan produced by this transition
    PersistPlan,

    /// Schedule a retry of the decision request
    ScheduleRetry { delay: Duration, attempt: u32 },
}

impl Effect {
    pub fn record_assistant(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Effect::RecordAssistant {
            text: text.into(),
            calls,
        }
    }

    pub fn dispatch(calls: Vec<ToolCall>) -> Self {
        Effect::DispatchTools { calls }
    }
}
