//! Retrieval error taxonomy and result-level warnings.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which external capability failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Embedding,
    VectorBackend,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Embedding => f.write_str("embedding provider"),
            ProviderKind::VectorBackend => f.write_str("vector backend"),
        }
    }
}

/// Hard failures surfaced to the caller.
///
/// Recoverable conditions — degraded mode, partial index failures, empty
/// pools — travel through result metadata instead, never through this type.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// An external call kept failing after the bounded retry budget
    /// (exponential backoff, default 2 retries) was spent.
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable {
        provider: ProviderKind,
        reason: String,
    },

    /// Collection vector dimension disagrees with the embedding provider's
    /// output. Fatal at configuration time; vectors are never truncated or
    /// padded to fit.
    #[error("vector dimension mismatch: collection expects {expected}, provider produces {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("retrieval cancelled by caller")]
    Cancelled,

    #[error("retrieval deadline elapsed")]
    DeadlineExceeded,

    #[error("invalid retrieval settings: {0}")]
    InvalidSettings(String),
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// Recoverable, result-level notices. One search stage failing while the
/// other succeeds degrades the call instead of failing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievalWarning {
    SemanticSearchUnavailable { reason: String },
    TextSearchUnavailable { reason: String },
}

impl fmt::Display for RetrievalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalWarning::SemanticSearchUnavailable { reason } => {
                write!(f, "semantic search unavailable, text-only results: {reason}")
            }
            RetrievalWarning::TextSearchUnavailable { reason } => {
                write!(f, "text search unavailable, semantic-only results: {reason}")
            }
        }
    }
}
