//! Caller-facing result assembly: pure projection, no recomputation.

use serde::{Deserialize, Serialize};

use ricerag_core::{Candidate, RetrievalWarning, TrustLevel};

/// One retrieved chunk as exposed to the caller. Rank bookkeeping stays
/// inside the engine; only the fused score travels out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    /// Source document filename.
    pub source: String,
    pub trust: TrustLevel,
    /// Content-type tag.
    pub kind: String,
    /// Fused (RRF) score the chunk was ranked by.
    pub score: f64,
}

impl From<&Candidate> for RetrievedChunk {
    fn from(candidate: &Candidate) -> Self {
        Self {
            content: candidate.chunk.content.clone(),
            source: candidate.chunk.metadata.source.clone(),
            trust: candidate.chunk.metadata.trust,
            kind: candidate.chunk.metadata.kind.clone(),
            score: candidate.fused_score,
        }
    }
}

/// Ordered results (at most `final_k`) plus recoverable, result-level
/// warnings. An empty result list is a valid outcome, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    pub results: Vec<RetrievedChunk>,
    pub warnings: Vec<RetrievalWarning>,
}

impl RetrievalOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Render results as context blocks for a downstream prompt:
    /// `[source:FILE][trust:LEVEL] content`, blank-line separated.
    pub fn format_context(&self) -> String {
        self.results
            .iter()
            .map(|result| {
                format!(
                    "[source:{}][trust:{}] {}",
                    result.source, result.trust, result.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
