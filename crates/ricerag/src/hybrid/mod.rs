//! Hybrid retrieval: concurrent search stages, rank fusion,
//! diversification, result assembly.

pub mod engine;
pub mod fusion;
pub mod mmr;
pub mod results;

pub use engine::HybridRetriever;
pub use fusion::fuse;
pub use mmr::diversify;
pub use results::{RetrievalOutcome, RetrievedChunk};
