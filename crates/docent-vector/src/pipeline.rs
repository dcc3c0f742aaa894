//! Document ingestion pipeline.
//!
//! Stages an upload through text extraction, chunk splitting, embedding,
//! and index construction. Any stage failing aborts the whole ingestion;
//! there is never a partially built index.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use docent_core::error::{DocentError, Result};
use docent_llm::embedding::DynEmbeddingService;

use crate::extract;
use crate::index::DocumentIndex;
use crate::splitter::TextSplitter;

/// Summary of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Display name of the ingested document.
    pub document: String,
    /// Number of chunks the document produced.
    pub chunks: usize,
    /// Dimensionality of the indexed embedding vectors.
    pub dimensions: usize,
}

/// Ingestion pipeline: extract, split, embed, index.
///
/// The embedding service is shared with query-time embedding so that index
/// and query vectors agree on their space.
pub struct IngestPipeline {
    splitter: TextSplitter,
    embedder: Arc<dyn DynEmbeddingService>,
}

impl IngestPipeline {
    pub fn new(splitter: TextSplitter, embedder: Arc<dyn DynEmbeddingService>) -> Self {
        Self { splitter, embedder }
    }

    /// Ingest a PDF document from its raw bytes.
    pub async fn ingest_bytes(
        &self,
        name: &str,
        bytes: &[u8],
    ) -> Result<(DocumentIndex, IngestReport)> {
        let text = extract::extract_text(bytes)?;
        self.ingest_text(name, &text).await
    }

    /// Ingest already-extracted text.
    ///
    /// Embedding is all-or-nothing: the first failed chunk aborts the
    /// build and no index is produced.
    pub async fn ingest_text(
        &self,
        name: &str,
        text: &str,
    ) -> Result<(DocumentIndex, IngestReport)> {
        if text.trim().is_empty() {
            return Err(DocentError::Extraction(
                "document contains no extractable text".to_string(),
            ));
        }

        let chunks = self.splitter.split(text);
        debug!(document = name, chunks = chunks.len(), "Document split");

        let mut embeddings = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            embeddings.push(self.embedder.embed_boxed(&chunk.text).await?);
        }

        let index = DocumentIndex::build(chunks, embeddings)?;
        let report = IngestReport {
            document: name.to_string(),
            chunks: index.len(),
            dimensions: index.dimensions(),
        };

        info!(
            document = name,
            chunks = report.chunks,
            dimensions = report.dimensions,
            "Document ingested"
        );

        Ok((index, report))
    }

    pub fn splitter(&self) -> &TextSplitter {
        &self.splitter
    }
}
