//! In-memory vector index over embedded chunks.
//!
//! Brute-force cosine similarity over every stored vector. The index is
//! built once per Process action and never persisted; re-processing
//! builds a fresh one.

use anyhow::{bail, Result};
use uuid::Uuid;

use crate::embedding::{cosine_similarity, embed_in_batches, EmbeddingProvider};
use crate::models::{ChunkMetadata, SourceDocument, TextChunk};

struct IndexedChunk {
    id: String,
    content: String,
    vector: Vec<f32>,
    metadata: ChunkMetadata,
}

/// Similarity-searchable set of chunks.
pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
    model: String,
}

impl VectorIndex {
    /// Build from pre-computed vectors (one per chunk, same order).
    pub fn from_parts(chunks: &[TextChunk], vectors: Vec<Vec<f32>>, model: &str) -> Result<Self> {
        if chunks.len() != vectors.len() {
            bail!(
                "vector count ({}) does not match chunk count ({})",
                vectors.len(),
                chunks.len()
            );
        }

        let entries = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedChunk {
                id: Uuid::new_v4().to_string(),
                content: chunk.content.clone(),
                vector,
                metadata: ChunkMetadata::from_references(&chunk.references),
            })
            .collect();

        Ok(Self {
            entries,
            model: model.to_string(),
        })
    }

    /// Embed every chunk with `provider` and build the index.
    pub async fn build(
        provider: &dyn EmbeddingProvider,
        chunks: &[TextChunk],
        batch_size: usize,
        on_batch: impl FnMut(usize),
    ) -> Result<Self> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embed_in_batches(provider, &texts, batch_size, on_batch).await?;
        Self::from_parts(chunks, vectors, provider.model_name())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Top `k` chunks by descending cosine similarity. Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SourceDocument> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| {
                let e = &self.entries[i];
                SourceDocument {
                    chunk_id: e.id.clone(),
                    content: e.content.clone(),
                    metadata: e.metadata.clone(),
                    score,
                }
            })
            .collect()
    }
}
