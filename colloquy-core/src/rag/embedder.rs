//! Embedding generation using LLM providers.
//!
//! This module converts text into vector embeddings through the provider's
//! embedding endpoint. Every call is a single attempt bounded by a timeout.

use crate::provider::{Provider, ProviderError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The embedding service did not answer in time.
    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),

    /// The API response contained no embeddings.
    ///
    /// This typically indicates a problem with the model or request format.
    #[error("No embeddings returned")]
    NoEmbeddings,
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Generates vector embeddings for text using a provider embedding model.
///
/// The embedder converts text into high-dimensional vectors that capture
/// semantic meaning. These vectors can then be compared with cosine
/// similarity to find semantically similar text.
///
/// # Supported Models
///
/// Common embedding models:
/// - `text-embedding-3-small` - 1536-dimensional embeddings, good general purpose
/// - `text-embedding-3-large` - 3072-dimensional embeddings, higher quality
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
    timeout: Duration,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generates a vector embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The embedding API is unreachable or rejects the request
    /// - The call does not finish within the configured timeout
    /// - The API returns an empty vector
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = tokio::time::timeout(self.timeout, self.provider.embed(text, &self.model))
            .await
            .map_err(|_| EmbedderError::Timeout(self.timeout))??;

        if embedding.is_empty() {
            return Err(EmbedderError::NoEmbeddings);
        }
        debug!(model = %self.model, dimension = embedding.len(), "Generated embedding");
        Ok(embedding)
    }

    /// Embeds several texts one after another, preserving order.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse};
    use async_trait::async_trait;

    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        async fn chat<'a>(
            &'a self,
            _request: ChatRequest,
            _callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
        ) -> crate::provider::Result<()> {
            Ok(())
        }

        async fn embed(&self, text: &str, _model: &str) -> crate::provider::Result<Vec<f32>> {
            if text == "slow" {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if text.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn embedder() -> Embedder {
        Embedder::new(Arc::new(SlowProvider), "test-embed", Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_embed_returns_vector() {
        let embedding = embedder().embed("hello").await.unwrap();
        assert_eq!(embedding, vec![5.0, 1.0]);
    }

    #[tokio::test]
    async fn test_embed_times_out() {
        let err = embedder().embed("slow").await.unwrap_err();
        assert!(matches!(err, EmbedderError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_empty_embedding_is_an_error() {
        let err = embedder().embed("").await.unwrap_err();
        assert!(matches!(err, EmbedderError::NoEmbeddings));
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let embeddings = embedder().embed_batch(&["a", "abc"]).await.unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 1.0], vec![3.0, 1.0]]);
    }
}
