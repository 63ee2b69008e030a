//! colloquy-core - Conversational retrieval and tool-use engine
//!
//! Provides the building blocks for LLM applications that answer from
//! documents and call tools:
//! - LLM provider abstraction (OpenAI-compatible HTTP)
//! - RAG (Retrieval Augmented Generation)
//! - Bounded tool-use agent loop with conversation memory
//! - Map-reduce summarization
//! - Configuration management

// Public modules
pub mod chat;
pub mod config;
pub mod provider;
pub mod rag;
pub mod summarize;

// Public exports
pub use chat::{AgentError, AgentLoop, AgentRun, ConversationMemory, TurnOutcome};
pub use config::{Config, ConfigError};
pub use rag::{RagEngine, RagError, RagTool};
pub use summarize::{Summarizer, SummarizeError};

// Provider exports
pub use provider::{
    ChatRequest, ChatResponse, Message, OpenAiProvider, Provider, ProviderError, Role, Tool,
    ToolCall, ToolCallFunction, ToolFunction,
};
