//! Immutable per-document vector index with cosine similarity search.
//!
//! One index is built per uploaded document and never modified afterwards;
//! replacing a session's document builds a fresh index. Search is a
//! brute-force scan, which is exact and entirely adequate for the chunk
//! counts a single document produces.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docent_core::error::{DocentError, Result};

use crate::splitter::DocumentChunk;

/// A chunk returned from a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: Uuid,
    /// Position of the chunk in document order.
    pub ordinal: usize,
    /// Cosine similarity to the query vector.
    pub score: f64,
    pub text: String,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    embedding: Vec<f32>,
    chunk: DocumentChunk,
}

/// Searchable index over the embedding vectors of one document's chunks.
///
/// Immutable after construction. The same cosine metric serves build-time
/// layout and query-time ranking.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

impl DocumentIndex {
    /// Build an index from chunks and their embedding vectors.
    ///
    /// All-or-nothing: a count mismatch, an empty input, or inconsistent
    /// vector dimensions reject the whole build.
    pub fn build(chunks: Vec<DocumentChunk>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(DocentError::Embedding(
                "cannot build an index over zero chunks".to_string(),
            ));
        }
        if chunks.len() != embeddings.len() {
            return Err(DocentError::Embedding(format!(
                "chunk/embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimensions = embeddings[0].len();
        if dimensions == 0 {
            return Err(DocentError::Embedding(
                "embedding vectors are empty".to_string(),
            ));
        }
        if let Some(bad) = embeddings.iter().find(|v| v.len() != dimensions) {
            return Err(DocentError::Embedding(format!(
                "inconsistent embedding dimensions: expected {}, got {}",
                dimensions,
                bad.len()
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { embedding, chunk })
            .collect();

        Ok(Self {
            entries,
            dimensions,
        })
    }

    /// Return the `k` chunks most similar to the query vector, in
    /// descending score order.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if query.len() != self.dimensions {
            return Err(DocentError::Embedding(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<RetrievedChunk> = self
            .entries
            .iter()
            .map(|entry| RetrievedChunk {
                id: entry.chunk.id,
                ordinal: entry.chunk.ordinal,
                score: cosine_similarity(query, &entry.embedding),
                text: entry.chunk.text.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensionality of the indexed vectors.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Cosine similarity between two vectors, 0.0 when either has zero
/// magnitude or the lengths differ.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut mag_a = 0.0f64;
    let mut mag_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a.sqrt() * mag_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(ordinal: usize, text: &str) -> DocumentChunk {
        DocumentChunk {
            id: Uuid::new_v4(),
            ordinal,
            text: text.to_string(),
            overlap_len: 0,
        }
    }

    fn axis(dim: usize, index: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dim];
        v[index] = 1.0;
        v
    }

    #[test]
    fn test_build_and_query_ranking() {
        let chunks = vec![chunk(0, "first"), chunk(1, "second"), chunk(2, "third")];
        let embeddings = vec![axis(4, 0), axis(4, 1), axis(4, 2)];
        let index = DocumentIndex::build(chunks, embeddings).unwrap();

        let hits = index.query(&axis(4, 1), 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "second");
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_build_rejects_empty() {
        let err = DocumentIndex::build(vec![], vec![]).unwrap_err();
        assert!(matches!(err, DocentError::Embedding(_)));
    }

    #[test]
    fn test_build_rejects_count_mismatch() {
        let err = DocumentIndex::build(vec![chunk(0, "a")], vec![]).unwrap_err();
        assert!(matches!(err, DocentError::Embedding(_)));
    }

    #[test]
    fn test_build_rejects_mixed_dimensions() {
        let chunks = vec![chunk(0, "a"), chunk(1, "b")];
        let embeddings = vec![vec![1.0f32; 4], vec![1.0f32; 8]];
        let err = DocumentIndex::build(chunks, embeddings).unwrap_err();
        assert!(matches!(err, DocentError::Embedding(_)));
    }

    #[test]
    fn test_build_rejects_zero_dimensions() {
        let err = DocumentIndex::build(vec![chunk(0, "a")], vec![vec![]]).unwrap_err();
        assert!(matches!(err, DocentError::Embedding(_)));
    }

    #[test]
    fn test_query_rejects_dimension_mismatch() {
        let index = DocumentIndex::build(vec![chunk(0, "a")], vec![axis(4, 0)]).unwrap();
        let err = index.query(&[1.0f32; 8], 1).unwrap_err();
        assert!(matches!(err, DocentError::Embedding(_)));
    }

    #[test]
    fn test_query_respects_k() {
        let chunks: Vec<DocumentChunk> = (0..10).map(|i| chunk(i, "text")).collect();
        let embeddings: Vec<Vec<f32>> = (0..10).map(|_| vec![1.0f32; 4]).collect();
        let index = DocumentIndex::build(chunks, embeddings).unwrap();

        assert_eq!(index.query(&[1.0f32; 4], 3).unwrap().len(), 3);
        // k larger than the index returns everything.
        assert_eq!(index.query(&[1.0f32; 4], 100).unwrap().len(), 10);
    }

    #[test]
    fn test_results_keep_document_ordinals() {
        let chunks = vec![chunk(7, "late chunk"), chunk(2, "early chunk")];
        let embeddings = vec![axis(4, 0), axis(4, 1)];
        let index = DocumentIndex::build(chunks, embeddings).unwrap();

        let hits = index.query(&axis(4, 0), 2).unwrap();
        assert_eq!(hits[0].ordinal, 7);
        assert_eq!(hits[1].ordinal, 2);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![0.5f32; 64];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        assert!(cosine_similarity(&axis(16, 0), &axis(16, 1)).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&vec![0.0f32; 8], &vec![1.0f32; 8]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_length_mismatch() {
        assert_eq!(cosine_similarity(&[1.0f32; 4], &[1.0f32; 8]), 0.0);
    }

    #[test]
    fn test_len_and_dimensions() {
        let index = DocumentIndex::build(
            vec![chunk(0, "a"), chunk(1, "b")],
            vec![axis(6, 0), axis(6, 1)],
        )
        .unwrap();
        assert_eq!(index.len(), 2);
        assert!(!index.is_empty());
        assert_eq!(index.dimensions(), 6);
    }
}
