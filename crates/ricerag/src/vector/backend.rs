//! Vector backend capability boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ricerag_core::{Chunk, EmbeddedChunk, RetrievalError};

/// One hit from a backend search: the stored chunk, the stage's own score,
/// and the stored embedding when the backend returned it. Semantic hits
/// always carry a vector; text hits may not.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
    pub vector: Option<Vec<f32>>,
}

/// Outcome of one bulk ingestion call. Failed batches are reported, not
/// fatal: batches that succeeded stay written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub written: usize,
    pub failures: Vec<BatchFailure>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_chunks(&self) -> usize {
        self.failures.iter().map(|failure| failure.chunks).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Which pipeline step lost the batch ("embed" or "upsert").
    pub stage: String,
    pub batch_index: usize,
    pub chunks: usize,
    pub reason: String,
}

/// Consumed capability: nearest-neighbor search and exact field matching
/// over stored chunks, plus collection lifecycle.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Vector dimensionality the collection is configured for.
    fn dimension(&self) -> usize;

    /// Idempotently (re)create the collection for this backend's configured
    /// dimension under cosine distance. Destroys prior contents when the
    /// existing schema disagrees — an administrative action, never called
    /// per query.
    async fn configure_collection(&self) -> Result<(), RetrievalError>;

    /// Write chunks in batches of `batch_size`. Batches may be dispatched
    /// concurrently; a failing batch is reported in the result without
    /// aborting the remaining batches. Upserting an existing chunk id
    /// replaces the stored point.
    async fn upsert(
        &self,
        chunks: Vec<EmbeddedChunk>,
        batch_size: usize,
    ) -> Result<IngestReport, RetrievalError>;

    /// Nearest-neighbor search; only hits with score >= `threshold` are
    /// returned, ordered by descending score.
    async fn search_semantic(
        &self,
        query_vector: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, RetrievalError>;

    /// Exact/substring term match over chunk content, ordered by a monotone
    /// term-frequency score. The exact formula is not load-bearing; only the
    /// ordering feeds rank fusion.
    async fn search_text(&self, query: &str, limit: usize)
        -> Result<Vec<SearchHit>, RetrievalError>;
}
