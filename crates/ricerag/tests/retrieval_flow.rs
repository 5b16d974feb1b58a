//! End-to-end retrieval scenarios over the in-memory backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use ricerag::{
    Chunk, ChunkId, ChunkMetadata, EmbeddedChunk, EmbeddingError, EmbeddingProvider,
    HybridRetriever, IngestPipeline, MemoryIndex, RetrievalError, RetrievalSettings,
    RetrievalWarning, SearchHit, TrustLevel, VectorBackend,
};

const DIM: usize = 3;

/// Maps exact texts to fixed vectors; unknown texts get the fallback.
struct StaticEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl StaticEmbedder {
    fn new(entries: &[(&str, [f32; DIM])], fallback: [f32; DIM]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.to_vec()))
                .collect(),
            fallback: fallback.to_vec(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Transient("embedding service down".to_string()))
    }
}

/// Forwards to the memory index, except the operations marked as failing.
struct FlakyBackend {
    inner: MemoryIndex,
    fail_text: bool,
    fail_semantic: bool,
}

#[async_trait]
impl VectorBackend for FlakyBackend {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn configure_collection(&self) -> Result<(), RetrievalError> {
        self.inner.configure_collection().await
    }

    async fn upsert(
        &self,
        chunks: Vec<EmbeddedChunk>,
        batch_size: usize,
    ) -> Result<ricerag::IngestReport, RetrievalError> {
        self.inner.upsert(chunks, batch_size).await
    }

    async fn search_semantic(
        &self,
        query_vector: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        if self.fail_semantic {
            return Err(RetrievalError::ProviderUnavailable {
                provider: ricerag::ProviderKind::VectorBackend,
                reason: "semantic search down".to_string(),
            });
        }
        self.inner.search_semantic(query_vector, limit, threshold).await
    }

    async fn search_text(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        if self.fail_text {
            return Err(RetrievalError::ProviderUnavailable {
                provider: ricerag::ProviderKind::VectorBackend,
                reason: "text search down".to_string(),
            });
        }
        self.inner.search_text(query, limit).await
    }
}

/// Both searches hang long enough for cancellation to win.
struct SlowBackend;

#[async_trait]
impl VectorBackend for SlowBackend {
    fn dimension(&self) -> usize {
        DIM
    }

    async fn configure_collection(&self) -> Result<(), RetrievalError> {
        Ok(())
    }

    async fn upsert(
        &self,
        _chunks: Vec<EmbeddedChunk>,
        _batch_size: usize,
    ) -> Result<ricerag::IngestReport, RetrievalError> {
        Ok(ricerag::IngestReport::default())
    }

    async fn search_semantic(
        &self,
        _query_vector: &[f32],
        _limit: usize,
        _threshold: f32,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    async fn search_text(
        &self,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
}

const QUERY: &str = "turbofan engine efficiency";
const DOC_X: &str = "The turbofan engine efficiency exceeds older powerplant designs.";
const DOC_Y: &str = "High-bypass jets burn far less fuel per passenger mile.";
const DOC_Z: &str = "Boarding passes can be printed at the airport kiosk.";

fn corpus_embedder() -> Arc<StaticEmbedder> {
    Arc::new(StaticEmbedder::new(
        &[
            (QUERY, [1.0, 0.0, 0.0]),
            (DOC_X, [0.95, 0.312, 0.0]),
            (DOC_Y, [0.9, 0.436, 0.0]),
            (DOC_Z, [0.0, 1.0, 0.0]),
        ],
        [0.0, 0.0, 1.0],
    ))
}

fn corpus_chunks() -> Vec<Chunk> {
    vec![
        Chunk::new("doc-x", DOC_X, ChunkMetadata::new("engines.pdf").with_kind("pdf")),
        Chunk::new(
            "doc-y",
            DOC_Y,
            ChunkMetadata::new("fuel.md")
                .with_kind("md")
                .with_trust(TrustLevel::Untrusted),
        ),
        Chunk::new("doc-z", DOC_Z, ChunkMetadata::new("travel.txt")),
    ]
}

fn scenario_settings() -> RetrievalSettings {
    RetrievalSettings {
        semantic_weight: 0.7,
        text_weight: 0.3,
        semantic_threshold: 0.15,
        final_k: 3,
        ..RetrievalSettings::default()
    }
}

async fn indexed_backend(embedder: Arc<StaticEmbedder>) -> Arc<MemoryIndex> {
    let backend = Arc::new(MemoryIndex::new(DIM));
    backend.configure_collection().await.unwrap();
    let pipeline = IngestPipeline::new(embedder, backend.clone()).unwrap();
    let report = pipeline
        .index_chunks(corpus_chunks(), &scenario_settings())
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.written, 3);
    backend
}

#[tokio::test]
async fn hybrid_scenario_ranks_literal_match_at_or_above_semantic_neighbor() {
    let embedder = corpus_embedder();
    let backend = indexed_backend(embedder.clone()).await;
    let retriever = HybridRetriever::new(embedder, backend).unwrap();

    let outcome = retriever.retrieve(QUERY, &scenario_settings()).await.unwrap();
    assert!(!outcome.is_degraded());

    let sources: Vec<&str> = outcome.results.iter().map(|r| r.source.as_str()).collect();
    // X carries the literal phrase (both lists); Y is the semantic neighbor.
    assert!(sources.contains(&"engines.pdf"));
    assert!(sources.contains(&"fuel.md"));
    let x_pos = sources.iter().position(|s| *s == "engines.pdf").unwrap();
    let y_pos = sources.iter().position(|s| *s == "fuel.md").unwrap();
    assert!(x_pos < y_pos, "literal match must rank at or above the paraphrase");
    // Z is neither semantically close nor a term match.
    assert!(!sources.contains(&"travel.txt"));

    // Trust classification survives the projection.
    assert_eq!(outcome.results[y_pos].trust, TrustLevel::Untrusted);

    let context = outcome.format_context();
    assert!(context.contains("[source:engines.pdf][trust:trusted]"));
    assert!(context.contains("[source:fuel.md][trust:untrusted]"));
}

#[tokio::test]
async fn low_similarity_candidates_never_pass_the_threshold() {
    let embedder = corpus_embedder();
    let backend = Arc::new(MemoryIndex::new(DIM));
    // One stored chunk at cosine 0.05 against the query vector.
    backend
        .upsert(
            vec![EmbeddedChunk::new(
                Chunk::new("weak", "nothing in common", ChunkMetadata::new("weak.txt")),
                vec![0.05, 0.99875, 0.0],
            )],
            16,
        )
        .await
        .unwrap();

    let hits = backend.search_semantic(&[1.0, 0.0, 0.0], 10, 0.15).await.unwrap();
    assert!(hits.is_empty(), "0.05 < 0.15 must be excluded even with free slots");

    let retriever = HybridRetriever::new(embedder, backend).unwrap();
    let settings = RetrievalSettings {
        semantic_threshold: 0.15,
        ..scenario_settings()
    };
    let outcome = retriever.retrieve(QUERY, &settings).await.unwrap();
    assert!(outcome.is_empty());
}

#[tokio::test]
async fn embedding_outage_degrades_to_text_only_with_warning() {
    let backend = indexed_backend(corpus_embedder()).await;
    let retriever = HybridRetriever::new(Arc::new(FailingEmbedder), backend).unwrap();

    let outcome = retriever.retrieve(QUERY, &scenario_settings()).await.unwrap();
    assert!(outcome.is_degraded());
    assert!(matches!(
        outcome.warnings[0],
        RetrievalWarning::SemanticSearchUnavailable { .. }
    ));
    // The literal match still arrives through the text stage.
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].source, "engines.pdf");
    assert_eq!(retriever.telemetry().snapshot().degraded_searches, 1);
}

#[tokio::test]
async fn text_outage_degrades_to_semantic_only_with_warning() {
    let embedder = corpus_embedder();
    let seeded = indexed_backend(embedder.clone()).await;
    let mut chunks = Vec::new();
    for chunk in corpus_chunks() {
        let stored = seeded.get(&chunk.id).unwrap();
        chunks.push(stored);
    }
    let backend = Arc::new(FlakyBackend {
        inner: MemoryIndex::new(DIM),
        fail_text: true,
        fail_semantic: false,
    });
    backend.upsert(chunks, 16).await.unwrap();

    let retriever = HybridRetriever::new(embedder, backend).unwrap();
    let outcome = retriever.retrieve(QUERY, &scenario_settings()).await.unwrap();
    assert!(matches!(
        outcome.warnings[0],
        RetrievalWarning::TextSearchUnavailable { .. }
    ));
    let sources: Vec<&str> = outcome.results.iter().map(|r| r.source.as_str()).collect();
    assert!(sources.contains(&"engines.pdf"));
    assert!(sources.contains(&"fuel.md"));
}

#[tokio::test]
async fn both_stages_failing_is_a_hard_error() {
    let backend = Arc::new(FlakyBackend {
        inner: MemoryIndex::new(DIM),
        fail_text: true,
        fail_semantic: true,
    });
    let retriever = HybridRetriever::new(Arc::new(FailingEmbedder), backend).unwrap();
    let err = retriever
        .retrieve(QUERY, &scenario_settings())
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::ProviderUnavailable { .. }));
}

#[tokio::test]
async fn cancellation_aborts_in_flight_searches() {
    let retriever =
        HybridRetriever::new(corpus_embedder(), Arc::new(SlowBackend)).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = retriever
        .retrieve_with_cancel(QUERY, &scenario_settings(), &cancel, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Cancelled));
}

#[tokio::test]
async fn deadline_aborts_in_flight_searches() {
    let retriever =
        HybridRetriever::new(corpus_embedder(), Arc::new(SlowBackend)).unwrap();
    let cancel = CancellationToken::new();
    let err = retriever
        .retrieve_with_cancel(
            QUERY,
            &scenario_settings(),
            &cancel,
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::DeadlineExceeded));
}

#[tokio::test]
async fn reingesting_a_chunk_id_replaces_the_stored_chunk() {
    let embedder = corpus_embedder();
    let backend = Arc::new(MemoryIndex::new(DIM));
    let pipeline = IngestPipeline::new(embedder.clone(), backend.clone()).unwrap();
    let settings = scenario_settings();

    let first = Chunk::new("doc-x", DOC_Z, ChunkMetadata::new("stale.txt"));
    pipeline.index_chunks(vec![first], &settings).await.unwrap();
    let second = Chunk::new("doc-x", DOC_X, ChunkMetadata::new("engines.pdf"));
    pipeline.index_chunks(vec![second], &settings).await.unwrap();

    assert_eq!(backend.len(), 1);
    let stored = backend.get(&ChunkId::from("doc-x")).unwrap();
    assert_eq!(stored.chunk.content, DOC_X);
    assert_eq!(stored.chunk.metadata.source, "engines.pdf");

    let retriever = HybridRetriever::new(embedder, backend).unwrap();
    let outcome = retriever.retrieve(QUERY, &settings).await.unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].content, DOC_X);
}
