//! Events that can occur during a turn

use crate::llm::LlmErrorKind;
use crate::state_machine::state::ToolCall;
use crate::tools::Observation;
use std::time::Duration;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Reasoning events
    Decision {
        text: String,
        calls: Vec<ToolCall>,
    },
    DecisionFailed {
        message: String,
        kind: LlmErrorKind,
        attempt: u32,
        /// Wait requested by the provider, honored when longer than the backoff
        retry_after: Option<Duration>,
    },
    RetryTimeout {
        attempt: u32,
    },

    // Tool events
    /// Observations for the external calls of the pending decision
    ToolsComplete {
        observations: Vec<Observation>,
    },

    // Caller events
    Cancel,
}
