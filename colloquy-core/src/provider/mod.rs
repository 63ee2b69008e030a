//! LLM provider abstraction layer.
//!
//! This module defines a common interface for hosted LLM backends
//! to provide chat completions and embeddings.

mod stream;
mod types;
pub mod openai;

// Re-export common types
pub use types::{
    Provider,
    ProviderError,
    Result,
    ChatRequest,
    ChatResponse,
    Message,
    Role,
    Tool,
    ToolCall,
    ToolFunction,
    ToolCallFunction,
};

pub use stream::complete;

// Re-export provider implementations
pub use openai::OpenAiProvider;
