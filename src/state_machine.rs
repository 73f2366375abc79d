//! Turn state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! transition function decides what happens next and applies plan merges,
//! the runtime executor performs the resulting effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ToolCall, ToolInput, TurnState};
pub use transition::{transition, TransitionError};
