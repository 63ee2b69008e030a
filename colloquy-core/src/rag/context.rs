use super::types::SearchResult;

/// Separator placed between retrieved chunks.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Joins retrieved record contents into a single context string.
///
/// Retrieval order is preserved and nothing is deduplicated.
pub fn assemble_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| r.record.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::IndexRecord;

    fn result(content: &str, score: f32) -> SearchResult {
        SearchResult {
            record: IndexRecord::new(content, content, vec![1.0]),
            score,
        }
    }

    #[test]
    fn test_joins_in_retrieval_order() {
        let results = vec![result("second best", 0.9), result("best", 0.5), result("second best", 0.1)];
        assert_eq!(assemble_context(&results), "second best\n\nbest\n\nsecond best");
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(assemble_context(&[]), "");
    }
}
