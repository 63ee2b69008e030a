//! Vector store abstraction and factory.
//!
//! Two in-memory strategies share one interface:
//!
//! - [`FlatStore`]: exact scan of every record followed by a stable sort.
//! - [`CachedNormStore`]: record magnitudes are computed once at insertion and
//!   the top `k` are selected with a bounded heap.
//!
//! Both score through [`similarity::score`](super::similarity::score) and order
//! results by the same total order (score descending, then insertion order), so
//! their rankings are identical.

use super::similarity::{self, SimilarityMetric};
use super::types::{IndexRecord, SearchResult};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("Embedding dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Record '{0}' has an empty embedding")]
    EmptyEmbedding(String),

    #[error("Record '{0}' has a non-finite embedding value")]
    NonFiniteEmbedding(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified interface for vector index operations.
///
/// Adding takes `&mut self` and searching takes `&self`: an index is filled
/// first and then shared read-only (for example behind an `Arc`) without locks.
pub trait VectorStore: Send + Sync {
    /// Adds records, skipping any whose id is already stored.
    ///
    /// The first record ever added fixes the dimensionality. A batch containing a
    /// record of another dimensionality is rejected as a whole.
    ///
    /// # Returns
    ///
    /// The number of records actually inserted.
    fn add(&mut self, records: Vec<IndexRecord>) -> Result<usize>;

    /// Searches for the most similar records.
    ///
    /// # Returns
    ///
    /// At most `k` results, sorted by descending similarity, ties broken by
    /// insertion order. An empty index yields an empty vector.
    fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Returns the total number of records in the store.
    fn count(&self) -> usize;

    /// Looks up a record by id.
    fn get(&self, id: &str) -> Option<&IndexRecord>;

    /// Removes all records.
    fn clear(&mut self);

    fn metric(&self) -> SimilarityMetric;
}

/// Which store implementation to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Exact brute-force scan
    #[default]
    Flat,
    /// Exact scan over cached magnitudes with heap-based top-k selection
    CachedNorm,
}

/// Creates a vector store for the given strategy and metric.
pub fn create_vector_store(kind: IndexKind, metric: SimilarityMetric) -> Box<dyn VectorStore> {
    match kind {
        IndexKind::Flat => Box::new(FlatStore::new(metric)),
        IndexKind::CachedNorm => Box::new(CachedNormStore::new(metric)),
    }
}

/// Insertion-ordered records with id uniqueness and a fixed dimensionality.
#[derive(Debug, Default)]
struct RecordSet {
    records: Vec<IndexRecord>,
    ids: HashSet<String>,
    dimension: Option<usize>,
}

impl RecordSet {
    /// Validates a batch and returns the records that are new.
    fn admit(&self, records: Vec<IndexRecord>) -> Result<Vec<IndexRecord>> {
        let mut expected = self.dimension;
        for record in &records {
            if record.embedding.is_empty() {
                return Err(StoreError::EmptyEmbedding(record.id.clone()));
            }
            if !record.embedding.iter().all(|v| v.is_finite()) {
                return Err(StoreError::NonFiniteEmbedding(record.id.clone()));
            }
            let actual = record.embedding.len();
            match expected {
                Some(expected) if expected != actual => {
                    return Err(StoreError::DimensionMismatch { expected, actual });
                }
                None => expected = Some(actual),
                _ => {}
            }
        }

        let mut seen = HashSet::new();
        Ok(records
            .into_iter()
            .filter(|r| !self.ids.contains(&r.id) && seen.insert(r.id.clone()))
            .collect())
    }

    fn push(&mut self, record: IndexRecord) {
        self.dimension.get_or_insert(record.embedding.len());
        self.ids.insert(record.id.clone());
        self.records.push(record);
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != query.len() => Err(StoreError::DimensionMismatch {
                expected,
                actual: query.len(),
            }),
            _ => Ok(()),
        }
    }

    fn get(&self, id: &str) -> Option<&IndexRecord> {
        if !self.ids.contains(id) {
            return None;
        }
        self.records.iter().find(|r| r.id == id)
    }

    fn clear(&mut self) {
        self.records.clear();
        self.ids.clear();
        self.dimension = None;
    }
}

/// Exact brute-force vector store.
#[derive(Debug, Default)]
pub struct FlatStore {
    metric: SimilarityMetric,
    records: RecordSet,
}

impl FlatStore {
    pub fn new(metric: SimilarityMetric) -> Self {
        Self {
            metric,
            records: RecordSet::default(),
        }
    }
}

impl VectorStore for FlatStore {
    fn add(&mut self, records: Vec<IndexRecord>) -> Result<usize> {
        let admitted = self.records.admit(records)?;
        let inserted = admitted.len();
        for record in admitted {
            self.records.push(record);
        }
        debug!(inserted, total = self.records.records.len(), "Added records to flat store");
        Ok(inserted)
    }

    fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if self.records.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.records.check_query(query_embedding)?;

        let mut scored: Vec<(&IndexRecord, f32)> = self
            .records
            .records
            .iter()
            .map(|r| {
                let score = similarity::score(self.metric, &r.embedding, query_embedding, None, None);
                (r, score)
            })
            .collect();

        // Stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(record, score)| SearchResult {
                record: record.clone(),
                score,
            })
            .collect())
    }

    fn count(&self) -> usize {
        self.records.records.len()
    }

    fn get(&self, id: &str) -> Option<&IndexRecord> {
        self.records.get(id)
    }

    fn clear(&mut self) {
        self.records.clear();
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }
}

/// Vector store that caches record magnitudes and keeps only the best `k`
/// candidates while scanning.
///
/// Scores are computed with the same arithmetic as [`FlatStore`], so the
/// ranking does not deviate from the exact baseline.
#[derive(Debug, Default)]
pub struct CachedNormStore {
    metric: SimilarityMetric,
    records: RecordSet,
    magnitudes: Vec<f32>,
}

impl CachedNormStore {
    pub fn new(metric: SimilarityMetric) -> Self {
        Self {
            metric,
            records: RecordSet::default(),
            magnitudes: Vec::new(),
        }
    }
}

/// Heap entry ordered by score, then by earlier insertion.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f32,
    position: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.position.cmp(&self.position))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl VectorStore for CachedNormStore {
    fn add(&mut self, records: Vec<IndexRecord>) -> Result<usize> {
        let admitted = self.records.admit(records)?;
        let inserted = admitted.len();
        for record in admitted {
            self.magnitudes.push(similarity::magnitude(&record.embedding));
            self.records.push(record);
        }
        debug!(inserted, total = self.records.records.len(), "Added records to cached-norm store");
        Ok(inserted)
    }

    fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if self.records.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.records.check_query(query_embedding)?;

        let query_magnitude = similarity::magnitude(query_embedding);
        let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(k + 1);

        for (position, record) in self.records.records.iter().enumerate() {
            let score = similarity::score(
                self.metric,
                &record.embedding,
                query_embedding,
                Some(self.magnitudes[position]),
                Some(query_magnitude),
            );
            heap.push(Reverse(Candidate { score, position }));
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut best: Vec<Candidate> = heap.into_iter().map(|Reverse(c)| c).collect();
        best.sort_by(|a, b| b.cmp(a));

        Ok(best
            .into_iter()
            .map(|c| SearchResult {
                record: self.records.records[c.position].clone(),
                score: c.score,
            })
            .collect())
    }

    fn count(&self) -> usize {
        self.records.records.len()
    }

    fn get(&self, id: &str) -> Option<&IndexRecord> {
        self.records.get(id)
    }

    fn clear(&mut self) {
        self.records.clear();
        self.magnitudes.clear();
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }
}
