use super::RagEngine;
use async_trait::async_trait;
use colloquy_plugin::{Tool, ToolError};
use std::sync::Arc;

/// Exposes a built [`RagEngine`] to the agent loop.
///
/// The tool input is the question; the observation is the generated answer.
pub struct RagTool {
    engine: Arc<RagEngine>,
    name: String,
    description: String,
}

impl RagTool {
    pub fn new(engine: Arc<RagEngine>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            engine,
            name: name.into(),
            description: description.into(),
        }
    }
}

#[async_trait]
impl Tool for RagTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, input: &str) -> colloquy_plugin::Result<String> {
        if input.trim().is_empty() {
            return Err(ToolError::InvalidInput("question is empty".into()));
        }
        self.engine
            .answer(input)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}
