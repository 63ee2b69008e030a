use std::collections::HashMap;

/// One retrievable unit stored in a vector index.
///
/// A record pairs the original chunk text with its embedding and optional
/// metadata such as the source file or URL. Metadata is kept exactly as given.
///
/// # Example
///
/// ```
/// # use colloquy_core::rag::IndexRecord;
/// let record = IndexRecord::new("doc_1", "Hello world", vec![0.1, 0.2, 0.3])
///     .with_metadata("source", "https://example.com")
///     .with_metadata("chunk", "0");
/// assert_eq!(record.metadata["source"], "https://example.com");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: HashMap<String, String>,
}

impl IndexRecord {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A search result containing a record and its similarity score.
///
/// Returned by vector search operations, ordered by descending score.
///
/// # Score Range
///
/// With cosine similarity scores range from -1.0 to 1.0:
/// - `1.0` - Identical direction
/// - `0.0` - Orthogonal, or either vector is all zeros
/// - `-1.0` - Opposite direction
///
/// Inner-product scores are unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub record: IndexRecord,
    pub score: f32,
}
