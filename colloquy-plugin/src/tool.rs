use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// JSON schema for a tool that takes one free-form string argument named `input`.
pub fn default_input_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "required": ["input"],
        "properties": {
            "input": {
                "type": "string",
                "description": "The text input for the tool"
            }
        }
    })
}

/// A named capability the model may call during a conversation.
///
/// Tools take a single piece of text and answer with a single piece of text.
/// Anything richer (numbers, JSON) is encoded in that text by the tool itself.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique identifier for this tool.
    /// This is what the model uses to request it.
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does.
    /// It is the only signal the model has when choosing between tools, so it must not be empty.
    fn description(&self) -> &str;

    /// JSON schema describing the arguments object the model should produce.
    fn input_schema(&self) -> Value {
        default_input_schema()
    }

    /// Run the tool and return its observation.
    async fn call(&self, input: &str) -> Result<String>;
}
