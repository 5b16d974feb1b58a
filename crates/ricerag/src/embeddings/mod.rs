//! Embedding provider boundary.
//!
//! The engine consumes embeddings as a capability; it never runs models
//! in-process. Implementations must distinguish transient failures from
//! permanent ones so callers can decide what is worth retrying.

mod http;

pub use http::{HttpEmbeddingConfig, HttpEmbeddingProvider};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Network faults, rate limits, upstream 5xx: retryable.
    #[error("transient embedding failure: {0}")]
    Transient(String),
    /// Malformed input, authentication, contract violations: not retryable.
    #[error("permanent embedding failure: {0}")]
    Permanent(String),
}

impl EmbeddingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmbeddingError::Transient(_))
    }
}

/// Consumed capability: turns text into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Output dimensionality. Must agree with the backend collection.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Batch variant. The default embeds sequentially; providers with a real
    /// batch endpoint should override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}
