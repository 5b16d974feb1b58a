//! In-memory backend: brute-force search for tests and offline runs.

use std::cmp::Ordering;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use ricerag_core::{cosine_similarity, ChunkId, EmbeddedChunk, RetrievalError};

use super::backend::{BatchFailure, IngestReport, SearchHit, VectorBackend};
use super::scoring::text_match_score;

/// Drop-in stand-in for the Qdrant adapter with the same search semantics:
/// thresholded cosine scores, occurrence-scored text match, upsert
/// idempotent by chunk id. Backs property tests and offline runs without a
/// live backend.
#[derive(Debug)]
pub struct MemoryIndex {
    dimension: usize,
    points: DashMap<ChunkId, EmbeddedChunk>,
}

impl MemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            points: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, id: &ChunkId) -> Option<EmbeddedChunk> {
        self.points.get(id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl VectorBackend for MemoryIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn configure_collection(&self) -> Result<(), RetrievalError> {
        // The schema is fixed at construction, so there is never a mismatch
        // to recreate for.
        debug!(dimension = self.dimension, "memory index ready");
        Ok(())
    }

    async fn upsert(
        &self,
        chunks: Vec<EmbeddedChunk>,
        batch_size: usize,
    ) -> Result<IngestReport, RetrievalError> {
        let mut report = IngestReport::default();
        for (batch_index, batch) in chunks.chunks(batch_size.max(1)).enumerate() {
            if let Some(bad) = batch
                .iter()
                .find(|embedded| embedded.vector.len() != self.dimension)
            {
                report.failures.push(BatchFailure {
                    stage: "upsert".to_string(),
                    batch_index,
                    chunks: batch.len(),
                    reason: format!(
                        "chunk {} has dimension {}, index expects {}",
                        bad.chunk.id,
                        bad.vector.len(),
                        self.dimension
                    ),
                });
                continue;
            }
            for embedded in batch {
                self.points
                    .insert(embedded.chunk.id.clone(), embedded.clone());
            }
            report.written += batch.len();
        }
        Ok(report)
    }

    async fn search_semantic(
        &self,
        query_vector: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let mut hits: Vec<SearchHit> = self
            .points
            .iter()
            .filter_map(|entry| {
                let score = cosine_similarity(query_vector, &entry.vector);
                if score >= threshold {
                    Some(SearchHit {
                        chunk: entry.chunk.clone(),
                        score,
                        vector: Some(entry.vector.clone()),
                    })
                } else {
                    None
                }
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn search_text(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let mut hits: Vec<SearchHit> = self
            .points
            .iter()
            .filter_map(|entry| {
                let score = text_match_score(&entry.chunk.content, query);
                if score > 0.0 {
                    Some(SearchHit {
                        chunk: entry.chunk.clone(),
                        score,
                        vector: Some(entry.vector.clone()),
                    })
                } else {
                    None
                }
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}
