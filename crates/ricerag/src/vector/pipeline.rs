//! Bulk ingestion: embed chunk batches and upsert them.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use ricerag_core::{Chunk, EmbeddedChunk, RetrievalError, RetrievalSettings};

use crate::embeddings::EmbeddingProvider;

use super::backend::{BatchFailure, IngestReport, VectorBackend};

/// Single ingestion path into the collection. Batches embed concurrently up
/// to the configured limit; a batch that fails to embed is reported and
/// skipped, never aborting the rest of the call.
pub struct IngestPipeline {
    embeddings: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn VectorBackend>,
    concurrency: usize,
}

impl std::fmt::Debug for IngestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestPipeline").finish_non_exhaustive()
    }
}

impl IngestPipeline {
    /// Fails with `SchemaMismatch` when the provider's output dimension
    /// disagrees with the collection.
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        backend: Arc<dyn VectorBackend>,
    ) -> Result<Self, RetrievalError> {
        if embeddings.dimension() != backend.dimension() {
            return Err(RetrievalError::SchemaMismatch {
                expected: backend.dimension(),
                actual: embeddings.dimension(),
            });
        }
        Ok(Self {
            embeddings,
            backend,
            concurrency: 4,
        })
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Embed and index `chunks` in batches of `settings.index_batch_size`.
    pub async fn index_chunks(
        &self,
        chunks: Vec<Chunk>,
        settings: &RetrievalSettings,
    ) -> Result<IngestReport, RetrievalError> {
        settings.validate()?;
        if chunks.is_empty() {
            return Ok(IngestReport::default());
        }
        let batch_size = settings.index_batch_size;
        let total = chunks.len();
        let batches: Vec<(usize, Vec<Chunk>)> = chunks
            .chunks(batch_size)
            .map(<[Chunk]>::to_vec)
            .enumerate()
            .collect();

        let mut report = IngestReport::default();
        let mut embedded = Vec::with_capacity(total);
        let stream = stream::iter(batches.into_iter().map(|(index, batch)| async move {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
            let outcome = self.embeddings.embed_batch(&texts).await;
            (index, batch, outcome)
        }))
        .buffer_unordered(self.concurrency);
        tokio::pin!(stream);
        while let Some((index, batch, outcome)) = stream.next().await {
            match outcome {
                Ok(vectors) if vectors.len() == batch.len() => {
                    for (chunk, vector) in batch.into_iter().zip(vectors) {
                        embedded.push(EmbeddedChunk::new(chunk, vector));
                    }
                }
                Ok(vectors) => {
                    report.failures.push(BatchFailure {
                        stage: "embed".to_string(),
                        batch_index: index,
                        chunks: batch.len(),
                        reason: format!(
                            "embedding batch returned {} vectors for {} chunks",
                            vectors.len(),
                            batch.len()
                        ),
                    });
                }
                Err(err) => {
                    warn!(batch = index, reason = %err, "embedding batch failed; its chunks are skipped");
                    report.failures.push(BatchFailure {
                        stage: "embed".to_string(),
                        batch_index: index,
                        chunks: batch.len(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let upsert_report = self.backend.upsert(embedded, batch_size).await?;
        report.written = upsert_report.written;
        report.failures.extend(upsert_report.failures);
        report.failures.sort_by_key(|failure| failure.batch_index);
        debug!(
            written = report.written,
            failed = report.failed_chunks(),
            total,
            "ingestion finished"
        );
        Ok(report)
    }
}
