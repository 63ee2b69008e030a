//! Retrieval Augmented Generation (RAG) system.
//!
//! This module implements a complete RAG pipeline for grounding LLM answers
//! in a body of text supplied at runtime.
//!
//! # Architecture
//!
//! - [`Segmenter`]: splits text into overlapping chunks
//! - [`Embedder`]: converts text to vector embeddings through the provider
//! - [`VectorStore`]: in-memory similarity search, built by [`create_vector_store`]
//! - [`assemble_context`]: joins retrieved chunks into prompt context
//! - [`RagEngine`]: ties the pieces together
//! - [`RagTool`]: exposes a built engine to the agent loop as a tool
//!
//! # How It Works
//!
//! 1. **Indexing Phase** (`&mut RagEngine`):
//!    - Text is split into chunks (default: 1000 chars with 200 chars of overlap)
//!    - Each chunk is converted to a vector embedding
//!    - Embeddings are stored in the vector index
//!
//! 2. **Retrieval Phase** (`&RagEngine`):
//!    - The question is converted to a vector embedding
//!    - The index returns the top-k most similar chunks
//!
//! 3. **Generation Phase**:
//!    - Retrieved chunks fill the `{context}` slot of the prompt template
//!    - The model answers from that context alone

mod context;
mod embedder;
mod prompt;
mod segmenter;
mod similarity;
mod store;
mod tool;
mod types;

pub use context::{assemble_context, CONTEXT_SEPARATOR};
pub use embedder::{Embedder, EmbedderError};
pub use prompt::{PromptTemplate, DEFAULT_PROMPT_TEMPLATE};
pub use segmenter::{Chunk, Chunks, Segmenter};
pub use similarity::{cosine_similarity, SimilarityMetric};
pub use store::{create_vector_store, CachedNormStore, FlatStore, IndexKind, StoreError, VectorStore};
pub use tool::RagTool;
pub use types::{IndexRecord, SearchResult};

use crate::config::{Config, ConfigError};
use crate::provider::{self, ChatRequest, Message, Provider, ProviderError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Embedder error: {0}")]
    Embedder(#[from] EmbedderError),

    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("Generation failed: {0}")]
    Generation(#[from] ProviderError),

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;

/// The RAG chain: retrieve, assemble, generate.
///
/// Indexing takes `&mut self`; retrieval and answering take `&self`. Once the
/// knowledge base is built the engine can be moved into an `Arc` and shared,
/// for example by a [`RagTool`].
///
/// # Configuration
///
/// The engine uses these settings from [`Config`]:
/// - `rag.embedding_model`: model for generating embeddings
/// - `rag.chunk_size` / `rag.chunk_overlap` / `rag.separators`: segmentation
/// - `rag.similarity_metric` / `rag.index`: vector index behaviour
/// - `rag.top_k`: number of chunks retrieved per question
/// - `rag.prompt_template`: answer prompt
/// - `llm.model` / `llm.temperature` / `llm.request_timeout_secs`: generation
pub struct RagEngine {
    embedder: Embedder,
    store: Box<dyn VectorStore>,
    segmenter: Segmenter,
    provider: Arc<dyn Provider>,
    template: PromptTemplate,
    model: String,
    temperature: f64,
    top_k: usize,
    timeout: Duration,
}

impl RagEngine {
    /// Creates an engine with an empty vector index.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use colloquy_core::{Config, rag::RagEngine, provider::OpenAiProvider};
    /// # use std::sync::Arc;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = Config::default();
    /// let provider = Arc::new(OpenAiProvider::from_config(&config.llm, config.api_key()?));
    /// let mut engine = RagEngine::new(&config, provider)?;
    /// engine.index_text("Rust was first released in 2015.", "notes").await?;
    /// let answer = engine.answer("When was Rust released?").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: &Config, provider: Arc<dyn Provider>) -> Result<Self> {
        let timeout = Duration::from_secs(config.llm.request_timeout_secs);
        let embedder = Embedder::new(provider.clone(), config.rag.embedding_model.clone(), timeout);
        let store = create_vector_store(config.rag.index, config.rag.similarity_metric);
        let segmenter = Segmenter::from_config(&config.rag)?;
        let template = PromptTemplate::new(&config.rag.prompt_template)?;

        if config.rag.top_k == 0 {
            return Err(ConfigError::Invalid("rag.top_k must be greater than 0".into()).into());
        }

        Ok(Self {
            embedder,
            store,
            segmenter,
            provider,
            template,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            top_k: config.rag.top_k,
            timeout,
        })
    }

    /// Replaces the vector index. Any records already indexed are discarded.
    pub fn with_store(mut self, store: Box<dyn VectorStore>) -> Self {
        self.store = store;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Segments, embeds and indexes a document.
    ///
    /// Chunks are embedded one after another. Records are only added once every
    /// chunk has been embedded, so a failure leaves the index untouched.
    ///
    /// Each record carries `source` and `chunk` metadata and the id
    /// `{source}_chunk_{index}`; indexing the same source twice is a no-op.
    ///
    /// # Returns
    ///
    /// The number of records added.
    pub async fn index_text(&mut self, text: &str, source: &str) -> Result<usize> {
        let chunks: Vec<Chunk> = self.segmenter.split_with_source(text, Some(source)).collect();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let records: Vec<IndexRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let id = format!("{}_chunk_{}", source, chunk.index);
                IndexRecord::new(id, chunk.text, embedding)
                    .with_metadata("source", source)
                    .with_metadata("chunk", chunk.index.to_string())
            })
            .collect();

        let chunk_count = records.len();
        let added = self.store.add(records)?;
        info!(source, chunk_count, added, "Indexed document");
        Ok(added)
    }

    /// Reads a UTF-8 file and indexes it with its path as the source.
    pub async fn index_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        self.index_text(&content, &path.to_string_lossy()).await
    }

    /// Returns the `k` records most similar to `query`.
    ///
    /// An empty knowledge base yields no results without calling the embedder.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if self.store.count() == 0 {
            debug!("Knowledge base is empty, returning no results");
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let results = self.store.search(&query_embedding, k)?;

        for (i, result) in results.iter().enumerate() {
            debug!(
                rank = i + 1,
                score = result.score,
                source = ?result.record.metadata.get("source"),
                "Retrieved chunk"
            );
        }
        info!(count = results.len(), "Found results from RAG search");
        Ok(results)
    }

    /// Retrieves the configured `top_k` chunks and joins them into context.
    pub async fn retrieve_context(&self, query: &str) -> Result<String> {
        let results = self.retrieve(query, self.top_k).await?;
        Ok(assemble_context(&results))
    }

    /// Answers a question from the indexed text.
    pub async fn answer(&self, question: &str) -> Result<String> {
        self.answer_stream(question, |_| {}).await
    }

    /// Answers a question, forwarding generated text to `on_chunk` as it streams.
    pub async fn answer_stream<F>(&self, question: &str, on_chunk: F) -> Result<String>
    where
        F: FnMut(&str) + Send,
    {
        let context = self.retrieve_context(question).await?;
        let prompt = self.template.render(&context, question);

        let request = ChatRequest::new(&self.model, vec![Message::user(prompt)])
            .with_temperature(self.temperature);
        let message = provider::complete(self.provider.as_ref(), request, self.timeout, on_chunk).await?;
        Ok(message.content)
    }

    /// Returns the number of records (chunks) in the knowledge base.
    pub fn count(&self) -> usize {
        self.store.count()
    }

    /// Removes all records from the knowledge base.
    pub fn clear(&mut self) {
        self.store.clear();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::KeywordProvider;
    use super::*;
    use std::io::Write;

    fn config(chunk_size: usize, overlap: usize, top_k: usize) -> Config {
        let mut config = Config::default();
        config.rag.chunk_size = chunk_size;
        config.rag.chunk_overlap = overlap;
        config.rag.top_k = top_k;
        config
    }

    const DOCUMENT: &str = "Cats purr when they are content.\n\nDogs bark at strangers.\n\nParrots can mimic speech.";

    #[tokio::test]
    async fn test_index_and_retrieve() {
        let provider = Arc::new(KeywordProvider::new(vec!["cat", "dog", "parrot"], "ok"));
        let mut engine = RagEngine::new(&config(40, 0, 2), provider).unwrap();

        let added = engine.index_text(DOCUMENT, "animals.txt").await.unwrap();
        assert_eq!(added, 3);
        assert_eq!(engine.count(), 3);

        let results = engine.retrieve("Tell me about dogs", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].record.content.starts_with("Dogs bark"));
        assert_eq!(results[0].record.metadata["source"], "animals.txt");
        assert_eq!(results[0].record.metadata["chunk"], "1");
    }

    #[tokio::test]
    async fn test_answer_fills_prompt_template() {
        let provider = Arc::new(KeywordProvider::new(vec!["cat", "dog", "parrot"], "They purr."));
        let mut engine = RagEngine::new(&config(40, 0, 1), provider.clone()).unwrap();
        engine.index_text(DOCUMENT, "animals.txt").await.unwrap();

        let answer = engine.answer("What do cats do?").await.unwrap();
        assert_eq!(answer, "They purr.");
        assert_eq!(
            provider.last_prompt(),
            "Answer the question based only on the following context:\nCats purr when they are content.\n\n\n\nQuestion: What do cats do?"
        );
    }

    #[tokio::test]
    async fn test_empty_knowledge_base_skips_embedding() {
        let provider = Arc::new(KeywordProvider::new(vec!["cat"], "I don't know."));
        let engine = RagEngine::new(&Config::default(), provider.clone()).unwrap();

        assert!(engine.retrieve("anything", 4).await.unwrap().is_empty());
        assert_eq!(*provider.embed_calls.lock().unwrap(), 0);

        let answer = engine.answer("anything").await.unwrap();
        assert_eq!(answer, "I don't know.");
        assert!(provider.last_prompt().contains("context:\n\n\nQuestion: anything"));
    }

    #[tokio::test]
    async fn test_failed_embedding_leaves_index_untouched() {
        let mut provider = KeywordProvider::new(vec!["cat", "dog", "parrot"], "ok");
        provider.fail_embedding_containing = Some("Parrots");
        let mut engine = RagEngine::new(&config(40, 0, 2), Arc::new(provider)).unwrap();

        let err = engine.index_text(DOCUMENT, "animals.txt").await.unwrap_err();
        assert!(matches!(err, RagError::Embedder(EmbedderError::Provider(_))));
        assert_eq!(engine.count(), 0);
    }

    #[tokio::test]
    async fn test_reindexing_same_source_is_noop() {
        let provider = Arc::new(KeywordProvider::new(vec!["cat", "dog", "parrot"], "ok"));
        let mut engine = RagEngine::new(&config(40, 0, 2), provider).unwrap();
        engine.index_text(DOCUMENT, "animals.txt").await.unwrap();
        assert_eq!(engine.index_text(DOCUMENT, "animals.txt").await.unwrap(), 0);
        assert_eq!(engine.count(), 3);

        engine.clear();
        assert_eq!(engine.count(), 0);
    }

    #[tokio::test]
    async fn test_index_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", DOCUMENT).unwrap();

        let provider = Arc::new(KeywordProvider::new(vec!["cat", "dog", "parrot"], "ok"));
        let mut engine = RagEngine::new(&config(40, 0, 2), provider).unwrap();
        assert_eq!(engine.index_file(file.path()).await.unwrap(), 3);

        let results = engine.retrieve("parrot", 1).await.unwrap();
        assert_eq!(results[0].record.metadata["source"], file.path().to_string_lossy());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let provider = Arc::new(KeywordProvider::new(vec!["cat"], "ok"));
        let mut engine = RagEngine::new(&Config::default(), provider).unwrap();
        let err = engine.index_file("/definitely/not/here.txt").await.unwrap_err();
        assert!(matches!(err, RagError::Io(_)));
    }

    #[tokio::test]
    async fn test_with_store_swaps_index() {
        let provider = Arc::new(KeywordProvider::new(vec!["cat", "dog", "parrot"], "ok"));
        let mut engine = RagEngine::new(&config(40, 0, 2), provider.clone())
            .unwrap()
            .with_store(Box::new(CachedNormStore::new(SimilarityMetric::InnerProduct)));
        engine.index_text(DOCUMENT, "animals.txt").await.unwrap();

        let results = engine.retrieve("parrot parrot", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].record.content.starts_with("Parrots"));
        assert_eq!(results[0].score, 2.0);
        assert_eq!(results[1].score, 0.0);
        assert_eq!(*provider.embed_calls.lock().unwrap(), 4);
    }

    #[test]
    fn test_invalid_template_rejected() {
        let provider = Arc::new(KeywordProvider::new(vec!["cat"], "ok"));
        let mut config = Config::default();
        config.rag.prompt_template = "no placeholders".into();
        assert!(matches!(RagEngine::new(&config, provider), Err(RagError::Config(_))));
    }
}
