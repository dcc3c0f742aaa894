//! Embedding service trait and implementations.
//!
//! - `OllamaEmbedding` calls an Ollama server's `/api/embeddings` endpoint
//!   with a fixed model name. Ingestion and query embedding share one
//!   instance so both sides of the index live in the same vector space.
//! - `MockEmbedding` produces deterministic unit vectors for testing.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use docent_core::error::DocentError;

/// Service for generating text embeddings.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, DocentError>> + Send;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// A blanket implementation covers every `EmbeddingService`, so production
/// code can share an `Arc<dyn DynEmbeddingService>` while tests pass
/// `MockEmbedding` directly.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, DocentError>> + Send + 'a>,
    >;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, DocentError>> + Send + 'a>,
    > {
        Box::pin(self.embed(text))
    }
}

// ---------------------------------------------------------------------------
// OllamaEmbedding - /api/embeddings client
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EmbeddingBody {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Ollama-backed embedding service with a fixed model.
#[derive(Debug, Clone)]
pub struct OllamaEmbedding {
    client: reqwest::Client,
    host: String,
    model: String,
}

impl OllamaEmbedding {
    /// Create a client for the given Ollama host and embedding model.
    pub fn new(
        host: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, DocentError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DocentError::Embedding(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: host.into(),
            model: model.into(),
        })
    }

    /// The configured embedding model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl EmbeddingService for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DocentError> {
        if text.is_empty() {
            return Err(DocentError::Embedding("cannot embed empty text".to_string()));
        }

        let body = EmbeddingBody {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| DocentError::Embedding(format!("embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(DocentError::Embedding(format!(
                "embedding request returned {}: {}",
                status, detail
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| DocentError::Embedding(format!("malformed embedding response: {}", e)))?;

        if parsed.embedding.is_empty() {
            return Err(DocentError::Embedding(
                "embedding response contained no vector".to_string(),
            ));
        }

        Ok(parsed.embedding)
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic vectors for testing
// ---------------------------------------------------------------------------

/// Dimensionality of mock embedding vectors.
const MOCK_DIMENSIONS: usize = 384;

/// Mock embedding service returning deterministic 384-dimensional unit
/// vectors.
///
/// The vector is an xorshift stream seeded from a hash of the input text,
/// so identical inputs always produce identical outputs and distinct inputs
/// diverge quickly.
#[derive(Debug, Clone, Default)]
pub struct MockEmbedding;

impl MockEmbedding {
    pub fn new() -> Self {
        Self
    }

    fn seeded_vector(text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        // xorshift64 cannot run from state 0.
        let mut state = hasher.finish() | 1;

        let mut vector = Vec::with_capacity(MOCK_DIMENSIONS);
        for _ in 0..MOCK_DIMENSIONS {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let value = (state as f64 / u64::MAX as f64) * 2.0 - 1.0;
            vector.push(value as f32);
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DocentError> {
        if text.is_empty() {
            return Err(DocentError::Embedding("cannot embed empty text".to_string()));
        }
        Ok(Self::seeded_vector(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedding_dimension() {
        let service = MockEmbedding::new();
        let vec = service.embed("hello world").await.unwrap();
        assert_eq!(vec.len(), MOCK_DIMENSIONS);
    }

    #[tokio::test]
    async fn test_mock_embedding_deterministic() {
        let service = MockEmbedding::new();
        let v1 = service.embed("same text").await.unwrap();
        let v2 = service.embed("same text").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_mock_embedding_different_inputs() {
        let service = MockEmbedding::new();
        let v1 = service.embed("text one").await.unwrap();
        let v2 = service.embed("text two").await.unwrap();
        assert_ne!(v1, v2);
    }

    #[tokio::test]
    async fn test_mock_embedding_empty_text() {
        let service = MockEmbedding::new();
        assert!(service.embed("").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_embedding_unit_norm() {
        let service = MockEmbedding::new();
        let vec = service.embed("norm check").await.unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {}", norm);
    }

    #[tokio::test]
    async fn test_dyn_dispatch() {
        let service: Box<dyn DynEmbeddingService> = Box::new(MockEmbedding::new());
        let vec = service.embed_boxed("dyn").await.unwrap();
        assert_eq!(vec.len(), MOCK_DIMENSIONS);
    }

    #[test]
    fn test_embedding_response_parsing() {
        let json = r#"{"embedding":[0.1,-0.2,0.3]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.embedding.len(), 3);
    }
}
