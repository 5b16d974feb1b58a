//! RiceRAG - hybrid retrieval and diversification engine
//!
//! Given a query, RiceRAG selects a small, relevant, non-redundant set of
//! document chunks from an indexed corpus: a semantic (ANN) stage and an
//! exact text-match stage run concurrently against the vector backend, their
//! candidate lists are merged with Reciprocal Rank Fusion, and the final K
//! results are picked greedily with Maximal Marginal Relevance.

pub mod embeddings;
pub mod hybrid;
pub mod retry;
pub mod telemetry;
pub mod vector;

pub use embeddings::{EmbeddingError, EmbeddingProvider, HttpEmbeddingConfig, HttpEmbeddingProvider};
pub use hybrid::{HybridRetriever, RetrievalOutcome, RetrievedChunk};
pub use retry::RetryPolicy;
pub use telemetry::{RetrievalTelemetry, RetrievalTelemetrySnapshot};
pub use vector::{
    BatchFailure, IngestPipeline, IngestReport, MemoryIndex, QdrantConfig, QdrantIndex, SearchHit,
    VectorBackend,
};

pub use ricerag_core::{
    Candidate, Chunk, ChunkId, ChunkMetadata, EmbeddedChunk, ProviderKind, Rank, RetrievalError,
    RetrievalResult, RetrievalSettings, RetrievalWarning, TrustLevel,
};
