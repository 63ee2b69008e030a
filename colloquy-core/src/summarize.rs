//! Map-reduce summarization of long text.
//!
//! The text is segmented, every chunk is summarized on its own (map), and the
//! partial summaries are combined into one (reduce). When the partial summaries
//! are themselves too long to combine in one prompt they are segmented and
//! summarized again (collapse), at most [`MAX_COLLAPSE_DEPTH`] times.

use crate::config::{default_separators, Config, ConfigError};
use crate::provider::{self, ChatRequest, Message, Provider, ProviderError};
use crate::rag::Segmenter;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Prompt applied to every chunk and to the combined summaries.
pub const DEFAULT_SUMMARY_PROMPT: &str =
    "Write a concise summary of the following:\n\n\n\"{text}\"\n\n\nCONCISE SUMMARY:";

pub const DEFAULT_SUMMARY_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_SUMMARY_CHUNK_OVERLAP: usize = 200;
pub const MAX_COLLAPSE_DEPTH: usize = 3;

const TEXT_PLACEHOLDER: &str = "{text}";

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Generation failed: {0}")]
    Generation(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, SummarizeError>;

pub struct Summarizer {
    provider: Arc<dyn Provider>,
    segmenter: Segmenter,
    model: String,
    temperature: f64,
    timeout: Duration,
    map_prompt: String,
    reduce_prompt: String,
}

impl Summarizer {
    /// Creates a summarizer using the model settings from `config` and the
    /// default 2000/200 segmentation.
    pub fn new(config: &Config, provider: Arc<dyn Provider>) -> Result<Self> {
        let segmenter = Segmenter::new(
            DEFAULT_SUMMARY_CHUNK_SIZE,
            DEFAULT_SUMMARY_CHUNK_OVERLAP,
            default_separators(),
        )?;

        Ok(Self {
            provider,
            segmenter,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            timeout: Duration::from_secs(config.llm.request_timeout_secs),
            map_prompt: DEFAULT_SUMMARY_PROMPT.to_string(),
            reduce_prompt: DEFAULT_SUMMARY_PROMPT.to_string(),
        })
    }

    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// Overrides the map and reduce prompts. Both must contain `{text}`.
    pub fn with_prompts(mut self, map_prompt: &str, reduce_prompt: &str) -> Result<Self> {
        for prompt in [map_prompt, reduce_prompt] {
            if !prompt.contains(TEXT_PLACEHOLDER) {
                return Err(ConfigError::Invalid(
                    "summary prompt is missing the {text} placeholder".into(),
                )
                .into());
            }
        }
        self.map_prompt = map_prompt.to_string();
        self.reduce_prompt = reduce_prompt.to_string();
        Ok(self)
    }

    /// Summarizes `text`.
    ///
    /// Blank input returns an empty summary without calling the model. Text that
    /// fits in a single chunk is summarized with one call.
    pub async fn summarize(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let mut summaries = self.map(text).await?;
        info!(partial_count = summaries.len(), "Mapped chunks to summaries");

        if summaries.len() == 1 {
            return Ok(summaries.remove(0));
        }

        let mut depth = 0;
        let mut combined = summaries.join("\n\n");
        while combined.chars().count() > self.segmenter.max_chunk_size()
            && summaries.len() > 1
            && depth < MAX_COLLAPSE_DEPTH
        {
            depth += 1;
            summaries = self.map(&combined).await?;
            combined = summaries.join("\n\n");
            debug!(depth, partial_count = summaries.len(), "Collapsed partial summaries");
        }

        self.generate(&self.reduce_prompt, &combined).await
    }

    async fn map(&self, text: &str) -> Result<Vec<String>> {
        let mut summaries = Vec::new();
        for chunk in self.segmenter.split(text) {
            summaries.push(self.generate(&self.map_prompt, &chunk.text).await?);
        }
        Ok(summaries)
    }

    async fn generate(&self, prompt: &str, text: &str) -> Result<String> {
        let request = ChatRequest::new(&self.model, vec![Message::user(prompt.replace(TEXT_PLACEHOLDER, text))])
            .with_temperature(self.temperature);
        let message = provider::complete(self.provider.as_ref(), request, self.timeout, |_| {}).await?;
        Ok(message.content.trim().to_string())
    }
}
