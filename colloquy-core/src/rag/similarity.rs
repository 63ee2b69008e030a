//! Vector similarity functions shared by every store implementation.
//!
//! Stores must score through [`score`] so that different strategies produce
//! bit-identical results for the same inputs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    InnerProduct,
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn magnitude(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Cosine similarity with optional precomputed magnitudes.
///
/// Zero vectors have similarity 0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32], mag_a: Option<f32>, mag_b: Option<f32>) -> f32 {
    let ma = mag_a.unwrap_or_else(|| magnitude(a));
    let mb = mag_b.unwrap_or_else(|| magnitude(b));

    if ma == 0.0 || mb == 0.0 {
        return 0.0;
    }

    dot(a, b) / (ma * mb)
}

/// Scores `record` against `query` under `metric`.
///
/// A NaN score becomes negative infinity so it ranks below every real score.
pub fn score(
    metric: SimilarityMetric,
    record: &[f32],
    query: &[f32],
    record_magnitude: Option<f32>,
    query_magnitude: Option<f32>,
) -> f32 {
    let score = match metric {
        SimilarityMetric::Cosine => {
            cosine_similarity(record, query, record_magnitude, query_magnitude)
        }
        SimilarityMetric::InnerProduct => dot(record, query),
    };
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}
