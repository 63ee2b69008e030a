use crate::Tool;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A tool named '{0}' is already registered")]
    DuplicateName(String),

    #[error("Tool '{0}' has an empty description")]
    EmptyDescription(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// Registry for managing tools.
///
/// The registry is responsible for:
/// - Registering tools, rejecting duplicate names and empty descriptions
/// - Looking up tools by name
/// - Invoking tools with failure containment
///
/// Tools are kept in registration order so the catalog sent to the model is stable.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();

        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        if tool.description().trim().is_empty() {
            return Err(RegistryError::EmptyDescription(name));
        }

        self.by_name.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Builder-style registration.
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Result<Self, RegistryError> {
        self.register(tool)?;
        Ok(self)
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    /// Get all registered tools, in registration order.
    pub fn all(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name and return its observation.
    ///
    /// Only an unknown name is an error. A tool that fails, or panics, produces an
    /// observation describing the failure instead.
    pub async fn invoke(&self, name: &str, input: &str) -> Result<String, RegistryError> {
        let tool = self
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;

        let outcome = AssertUnwindSafe(tool.call(input)).catch_unwind().await;

        let observation = match outcome {
            Ok(Ok(observation)) => observation,
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Tool returned an error");
                format!("Tool '{}' failed: {}", name, e)
            }
            Err(_) => {
                warn!(tool = %name, "Tool panicked");
                format!("Tool '{}' failed unexpectedly", name)
            }
        };

        Ok(observation)
    }
}
