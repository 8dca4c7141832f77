//! Session events.
//!
//! `SessionEvent` reports what the session loop is doing as it happens, so
//! a console (or any other observer) can render progress without the loop
//! knowing how it is displayed.

use osgate_tools::CommandOutput;
use serde::{Deserialize, Serialize};

/// Events emitted by [`AgentSession`](crate::loop_runner::AgentSession).
///
/// - `thinking`: a provider call is about to be made
/// - `reply`: the provider answered
/// - `contexts_loaded`: blocks were activated (by the planner or on request)
/// - `contexts_evicted`: blocks were evicted to make room
/// - `command_started`: the gate admitted a command and it is running
/// - `command_finished`: the command exited
/// - `command_rejected`: the gate vetoed a command, or it failed to run
/// - `finished`: the model said `FINISH:`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Thinking { iteration: u32 },

    Reply { content: String },

    ContextsLoaded { names: Vec<String> },

    ContextsEvicted { names: Vec<String> },

    CommandStarted { command: String },

    CommandFinished { command: String, output: CommandOutput },

    CommandRejected { command: String, reason: String },

    Finished { answer: String, iterations: u32 },
}

impl SessionEvent {
    /// Short event name, matching the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::Reply { .. } => "reply",
            Self::ContextsLoaded { .. } => "contexts_loaded",
            Self::ContextsEvicted { .. } => "contexts_evicted",
            Self::CommandStarted { .. } => "command_started",
            Self::CommandFinished { .. } => "command_finished",
            Self::CommandRejected { .. } => "command_rejected",
            Self::Finished { .. } => "finished",
        }
    }
}
