use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::chat::DEFAULT_MAX_ITERATIONS;
use crate::rag::{IndexKind, SimilarityMetric, DEFAULT_PROMPT_TEMPLATE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for a whole session.
///
/// Covers the model endpoint, retrieval behaviour, the agent loop and the standard tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Configuration for the hosted chat and embedding endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f64,
    /// Single-attempt timeout applied to every chat and embedding call
    pub request_timeout_secs: u64,
}

/// Configuration for RAG processing.
///
/// This covers embedding settings, segmentation, the vector index and the answer prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Separators tried in priority order when splitting text
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
    #[serde(default)]
    pub similarity_metric: SimilarityMetric,
    #[serde(default)]
    pub index: IndexKind,
    /// Number of records retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Must contain `{context}` and `{question}`
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Keep at most this many memory turns; unbounded when absent
    #[serde(default)]
    pub memory_max_turns: Option<usize>,
}

/// Settings for the standard tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub weather_base_url: String,
    pub weather_api_key_env: String,
    /// Timeout for each weather lookup
    #[serde(default = "default_tool_timeout_secs")]
    pub request_timeout_secs: u64,
}

pub fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ". ", " ", ""]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_top_k() -> usize {
    4
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_tool_timeout_secs() -> u64 {
    10
}

fn default_prompt_template() -> String {
    DEFAULT_PROMPT_TEMPLATE.to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant who can remember the previous conversation.".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.0,
            request_timeout_secs: 60,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_model: "text-embedding-3-small".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: default_separators(),
            similarity_metric: SimilarityMetric::default(),
            index: IndexKind::default(),
            top_k: default_top_k(),
            prompt_template: default_prompt_template(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            memory_max_turns: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            weather_base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            weather_api_key_env: "OPENWEATHER_API_KEY".to_string(),
            request_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            system_prompt: default_system_prompt(),
            rag: RagConfig::default(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("config.yaml").unwrap_or_default()
    }

    /// Checks every setting that can be checked before a network call is made.
    pub fn validate(&self) -> Result<()> {
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::Invalid("rag.chunk_size must be greater than 0".into()));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::Invalid("rag.top_k must be greater than 0".into()));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Invalid("agent.max_iterations must be greater than 0".into()));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("llm.request_timeout_secs must be greater than 0".into()));
        }
        if self.tools.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("tools.request_timeout_secs must be greater than 0".into()));
        }
        crate::rag::PromptTemplate::new(&self.rag.prompt_template)?;
        Ok(())
    }

    /// Reads the API key named by `llm.api_key_env` from the environment.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.llm.api_key_env).map_err(|_| {
            ConfigError::Invalid(format!("environment variable {} is not set", self.llm.api_key_env))
        })
    }
}
