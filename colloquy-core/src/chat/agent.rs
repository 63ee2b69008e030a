//! Bounded tool-use agent loop.
//!
//! # Flow
//!
//! ```text
//! User Input + Memory → LLM → Tool Call? ──no──→ Final Answer → Memory
//!                        ↑        │yes
//!                        │        ↓
//!                        └── Observation ← Execute Tool (≤ max_iterations)
//! ```
//!
//! Each iteration sends the system prompt, the memory history, the user input,
//! the tool catalog, and every tool call made so far in this turn together with
//! its observation. The model either answers or asks for one tool; only the
//! first requested call is serviced.
//!
//! Memory is written once, after a final answer. A turn that fails, exceeds its
//! iteration budget, or is dropped mid-flight leaves memory as it was.

use super::memory::ConversationMemory;
use crate::config::{Config, ConfigError};
use crate::provider::{self, ChatRequest, Message, Provider, ProviderError, Tool, ToolCall, ToolFunction};
use colloquy_plugin::{RegistryError, ToolRegistry};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default number of tool executions allowed per user turn.
pub const DEFAULT_MAX_ITERATIONS: usize = 3;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Generation failed: {0}")]
    Generation(#[from] ProviderError),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<RegistryError> for AgentError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownTool(name) => AgentError::UnknownTool(name),
            other => AgentError::Config(ConfigError::Invalid(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// What the model asked for in one reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Final(String),
    ToolCall { name: String, input: String },
}

impl Decision {
    /// Interprets an assistant message. Only the first tool call counts.
    pub fn from_message(message: &Message) -> Self {
        match message.tool_calls.as_deref() {
            Some([first, rest @ ..]) => {
                if !rest.is_empty() {
                    let ignored: Vec<&str> = rest.iter().map(|c| c.function.name.as_str()).collect();
                    warn!(?ignored, "Model requested several tools; only the first is executed");
                }
                Decision::ToolCall {
                    name: first.function.name.clone(),
                    input: tool_input(&first.function.arguments),
                }
            }
            _ => Decision::Final(message.content.clone()),
        }
    }
}

/// Extracts the single text input a tool receives from the model's arguments.
///
/// A bare string is used as is. For an object, the `input` field wins, then the
/// only field if there is exactly one string field. Anything else is passed as JSON.
pub fn tool_input(arguments: &Value) -> String {
    match arguments {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(Value::String(s)) = map.get("input") {
                return s.clone();
            }
            let strings: Vec<&String> = map
                .values()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect();
            match strings.as_slice() {
                [only] if map.len() == 1 => (*only).clone(),
                _ => arguments.to_string(),
            }
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Final,
    ExceededIterations,
}

/// One tool execution within a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStep {
    pub tool: String,
    pub input: String,
    pub observation: String,
}

/// Result of one user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRun {
    pub output: String,
    pub outcome: TurnOutcome,
    pub steps: Vec<AgentStep>,
}

/// Runs user turns against a provider and a tool registry.
///
/// # Examples
///
/// ```no_run
/// use colloquy_core::chat::{AgentLoop, ConversationMemory};
/// use colloquy_core::provider::OpenAiProvider;
/// use colloquy_core::Config;
/// use colloquy_plugin::ToolRegistry;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::load_or_default();
/// let provider = Arc::new(OpenAiProvider::from_config(&config.llm, config.api_key()?));
/// let agent = AgentLoop::new(&config, provider, ToolRegistry::new())?;
///
/// let mut memory = ConversationMemory::new();
/// let run = agent.run(&mut memory, "Hello!").await?;
/// println!("AI: {}", run.output);
/// # Ok(())
/// # }
/// ```
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    registry: ToolRegistry,
    system_prompt: String,
    model: String,
    temperature: f64,
    max_iterations: usize,
    timeout: Duration,
}

impl AgentLoop {
    pub fn new(config: &Config, provider: Arc<dyn Provider>, registry: ToolRegistry) -> Result<Self> {
        let agent = Self {
            provider,
            registry,
            system_prompt: config.system_prompt.clone(),
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            timeout: Duration::from_secs(config.llm.request_timeout_secs),
        };
        agent.with_max_iterations(config.agent.max_iterations)
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Sets the tool-execution budget per turn. Zero is rejected.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Result<Self> {
        if max_iterations == 0 {
            return Err(ConfigError::Invalid("max_iterations must be greater than 0".into()).into());
        }
        self.max_iterations = max_iterations;
        Ok(self)
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Runs one user turn to completion.
    pub async fn run(&self, memory: &mut ConversationMemory, input: &str) -> Result<AgentRun> {
        self.run_stream(memory, input, |_| {}).await
    }

    /// Runs one user turn, forwarding model text to `on_chunk` as it streams.
    ///
    /// # Errors
    ///
    /// - [`AgentError::Generation`] if a model call fails or times out
    /// - [`AgentError::UnknownTool`] if the model names a tool that is not registered
    ///
    /// Running out of iterations is not an error; it is reported through
    /// [`TurnOutcome::ExceededIterations`].
    pub async fn run_stream<F>(
        &self,
        memory: &mut ConversationMemory,
        input: &str,
        mut on_chunk: F,
    ) -> Result<AgentRun>
    where
        F: FnMut(&str) + Send,
    {
        let mut messages = Vec::with_capacity(memory.len() + 2);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(memory.messages());
        messages.push(Message::user(input));

        let tools = self.tool_catalog();
        let mut steps: Vec<AgentStep> = Vec::new();

        loop {
            debug!(
                message_count = messages.len(),
                tool_count = tools.len(),
                iteration = steps.len(),
                "Building chat request"
            );
            let mut request = ChatRequest::new(&self.model, messages.clone())
                .with_temperature(self.temperature);
            if !tools.is_empty() {
                request = request.with_tools(tools.clone());
            }

            let reply = provider::complete(self.provider.as_ref(), request, self.timeout, &mut on_chunk).await?;

            let (name, tool_input) = match Decision::from_message(&reply) {
                Decision::Final(answer) => {
                    memory.record_exchange(input, answer.clone());
                    info!(tool_executions = steps.len(), "Agent produced final answer");
                    return Ok(AgentRun {
                        output: answer,
                        outcome: TurnOutcome::Final,
                        steps,
                    });
                }
                Decision::ToolCall { name, input } => (name, input),
            };

            if self.registry.get(&name).is_none() {
                warn!(tool = %name, "Model requested an unknown tool");
                return Err(AgentError::UnknownTool(name));
            }

            // max_iterations is at least 1, so the limit is only reached after a tool ran.
            if let Some(last) = steps.last().filter(|_| steps.len() >= self.max_iterations) {
                warn!(
                    max_iterations = self.max_iterations,
                    tool = %name,
                    "Iteration limit reached; stopping turn"
                );
                let output = last.observation.clone();
                return Ok(AgentRun {
                    output,
                    outcome: TurnOutcome::ExceededIterations,
                    steps,
                });
            }

            info!(tool = %name, input = %tool_input, "Executing tool");
            let observation = self.registry.invoke(&name, &tool_input).await?;
            debug!(tool = %name, observation = %observation, "Tool finished");

            // Only the serviced call is echoed back, so every call in the
            // transcript has a matching tool message.
            let call = reply
                .tool_calls
                .as_ref()
                .and_then(|calls| calls.first())
                .cloned()
                .unwrap_or_else(|| ToolCall::new(None, name.clone(), Value::String(tool_input.clone())));
            let call_id = call.id.clone();
            messages.push(Message::assistant_tool_calls(reply.content, vec![call]));
            messages.push(Message::tool(observation.clone(), call_id));

            steps.push(AgentStep {
                tool: name,
                input: tool_input,
                observation,
            });
        }
    }

    fn tool_catalog(&self) -> Vec<Tool> {
        self.registry
            .all()
            .iter()
            .map(|tool| Tool {
                tool_type: "function".to_string(),
                function: ToolFunction {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.input_schema(),
                },
            })
            .collect()
    }
}
