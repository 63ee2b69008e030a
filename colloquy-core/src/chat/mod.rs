//! Conversation management with tool-augmented LLM capabilities.
//!
//! - [`AgentLoop`]: bounded decide/act/observe loop over a [`ToolRegistry`](colloquy_plugin::ToolRegistry)
//! - [`ConversationMemory`]: session-owned history replayed into every prompt

mod agent;
mod memory;

pub use agent::{
    tool_input, AgentError, AgentLoop, AgentRun, AgentStep, Decision, Result, TurnOutcome,
    DEFAULT_MAX_ITERATIONS,
};
pub use memory::{ConversationMemory, MemoryTurn, TurnRole};
