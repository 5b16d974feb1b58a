//! RiceRAG core domain layer
//!
//! Pure value objects for the hybrid retrieval engine: indexed chunks,
//! transient retrieval candidates, per-call settings, and the error
//! taxonomy. No I/O and no async here — infrastructure adapters (Qdrant,
//! embedding providers) live in the `ricerag` crate and depend on this one.

pub mod candidate;
pub mod chunk;
pub mod errors;
pub mod settings;
pub mod similarity;

pub use candidate::{Candidate, Rank};
pub use chunk::{Chunk, ChunkId, ChunkMetadata, EmbeddedChunk, TrustLevel};
pub use errors::{ProviderKind, RetrievalError, RetrievalResult, RetrievalWarning};
pub use settings::RetrievalSettings;
pub use similarity::cosine_similarity;
