//! Hybrid retrieval orchestration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ricerag_core::{
    Candidate, ProviderKind, RetrievalError, RetrievalSettings, RetrievalWarning,
};

use crate::embeddings::EmbeddingProvider;
use crate::telemetry::RetrievalTelemetry;
use crate::vector::{SearchHit, VectorBackend};

use super::results::{RetrievalOutcome, RetrievedChunk};
use super::{fusion, mmr};

/// One retrieval per call: the semantic and text stages run concurrently
/// against the backend, their lists are fused, and the final K results are
/// diversified. Degraded mode (one stage down) produces warnings, not
/// errors; the call fails hard only when both stages fail.
pub struct HybridRetriever {
    embeddings: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn VectorBackend>,
    telemetry: Arc<RetrievalTelemetry>,
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever").finish_non_exhaustive()
    }
}

impl HybridRetriever {
    /// Fails with `SchemaMismatch` when the provider's output dimension
    /// disagrees with the collection's configured dimension.
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
            telemetry: Arc::new(RetrievalTelemetry::default()),
        })
    }

    pub fn with_telemetry(mut self, telemetry: Arc<RetrievalTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn telemetry(&self) -> Arc<RetrievalTelemetry> {
        Arc::clone(&self.telemetry)
    }

    pub async fn retrieve(
        &self,
        query: &str,
        settings: &RetrievalSettings,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        settings.validate()?;
        self.telemetry.record_search();
        let started = Instant::now();

        let (semantic, text) = tokio::join!(
            self.semantic_candidates(query, settings),
            self.text_candidates(query, settings),
        );

        let mut warnings = Vec::new();
        let (semantic, text) = match (semantic, text) {
            (Ok(semantic), Ok(text)) => (semantic, text),
            (Ok(semantic), Err(err)) => {
                warn!(reason = %err, "text search failed; continuing semantic-only");
                self.telemetry.record_degraded();
                warnings.push(RetrievalWarning::TextSearchUnavailable {
                    reason: err.to_string(),
                });
                (semantic, Vec::new())
            }
            (Err(err), Ok(text)) => {
                warn!(reason = %err, "semantic search failed; continuing text-only");
                self.telemetry.record_degraded();
                warnings.push(RetrievalWarning::SemanticSearchUnavailable {
                    reason: err.to_string(),
                });
                (Vec::new(), text)
            }
            (Err(semantic_err), Err(text_err)) => {
                warn!(semantic = %semantic_err, text = %text_err, "both retrieval stages failed");
                self.telemetry.record_error(&semantic_err.to_string());
                return Err(semantic_err);
            }
        };

        let pool = fusion::fuse(semantic, text, settings);
        if pool.is_empty() {
            self.telemetry.record_empty_pool();
            debug!("fused pool empty");
            return Ok(RetrievalOutcome {
                results: Vec::new(),
                warnings,
            });
        }

        let selected = if settings.use_diversification {
            mmr::diversify(pool, settings.final_k, settings.mmr_lambda)
        } else {
            let mut pool = pool;
            pool.truncate(settings.final_k);
            pool
        };

        debug!(
            results = selected.len(),
            degraded = !warnings.is_empty(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "retrieval complete"
        );
        Ok(RetrievalOutcome {
            results: selected.iter().map(RetrievedChunk::from).collect(),
            warnings,
        })
    }

    /// Like [`retrieve`], but abortable: returns as soon as `cancel` fires
    /// or `deadline` elapses, dropping both in-flight searches. Cancellation
    /// is all-or-nothing — partial results are discarded, never fused.
    ///
    /// [`retrieve`]: HybridRetriever::retrieve
    pub async fn retrieve_with_cancel(
        &self,
        query: &str,
        settings: &RetrievalSettings,
        cancel: &CancellationToken,
        deadline: Option<Duration>,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        let work = self.retrieve(query, settings);
        tokio::pin!(work);
        match deadline {
            Some(deadline) => tokio::select! {
                _ = cancel.cancelled() => Err(RetrievalError::Cancelled),
                outcome = tokio::time::timeout(deadline, &mut work) => match outcome {
                    Ok(result) => result,
                    Err(_) => Err(RetrievalError::DeadlineExceeded),
                },
            },
            None => tokio::select! {
                _ = cancel.cancelled() => Err(RetrievalError::Cancelled),
                result = &mut work => result,
            },
        }
    }

    async fn semantic_candidates(
        &self,
        query: &str,
        settings: &RetrievalSettings,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        // Embedding failure fails this stage fast; no silent empty-result
        // fallback. The caller-facing policy lives in `retrieve`.
        let vector =
            self.embeddings
                .embed(query)
                .await
                .map_err(|err| RetrievalError::ProviderUnavailable {
                    provider: ProviderKind::Embedding,
                    reason: err.to_string(),
                })?;
        if vector.len() != self.backend.dimension() {
            return Err(RetrievalError::SchemaMismatch {
                expected: self.backend.dimension(),
                actual: vector.len(),
            });
        }
        let hits = self
            .backend
            .search_semantic(&vector, settings.semantic_candidates, settings.semantic_threshold)
            .await?;
        Ok(ranked(hits, Candidate::from_semantic))
    }

    async fn text_candidates(
        &self,
        query: &str,
        settings: &RetrievalSettings,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        let hits = self
            .backend
            .search_text(query, settings.text_candidates)
            .await?;
        Ok(ranked(hits, Candidate::from_text))
    }
}

fn ranked(
    hits: Vec<SearchHit>,
    make: impl Fn(ricerag_core::Chunk, Option<Vec<f32>>, usize, f32) -> Candidate,
) -> Vec<Candidate> {
    hits.into_iter()
        .enumerate()
        .map(|(index, hit)| make(hit.chunk, hit.vector, index + 1, hit.score))
        .collect()
}
