//! Vector backend adapters: Qdrant, in-memory double, ingestion pipeline.

pub mod backend;
pub mod memory;
pub mod pipeline;
pub mod qdrant;
pub mod scoring;

pub use backend::{BatchFailure, IngestReport, SearchHit, VectorBackend};
pub use memory::MemoryIndex;
pub use pipeline::IngestPipeline;
pub use qdrant::{QdrantConfig, QdrantIndex};
