//! Per-call retrieval configuration.

use serde::{Deserialize, Serialize};

use crate::errors::RetrievalError;

/// Immutable settings value object consumed per retrieval call.
///
/// Produced by an external configuration loader and threaded explicitly
/// through every call — the engine keeps no ambient mutable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Candidate count for the semantic (ANN) stage.
    #[serde(default = "default_semantic_candidates")]
    pub semantic_candidates: usize,
    /// Minimum cosine score for semantic candidates, in [0, 1].
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,
    /// Candidate count for the text-match stage.
    #[serde(default = "default_text_candidates")]
    pub text_candidates: usize,
    /// Fusion weight of the semantic list. Free non-negative scalar; the two
    /// weights need not sum to 1.
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    /// Fusion weight of the text list.
    #[serde(default = "default_text_weight")]
    pub text_weight: f64,
    /// RRF smoothing constant. 60 keeps rank 1 and rank 2 close enough that
    /// neither list dominates on tie-breaking alone.
    #[serde(default = "default_fusion_k")]
    pub fusion_k: u32,
    #[serde(default = "default_use_diversification")]
    pub use_diversification: bool,
    /// MMR trade-off in [0, 1]: 1 keeps plain fused order, 0 ignores
    /// relevance. Recommended operating range 0.5–0.7.
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f64,
    /// Final result count K.
    #[serde(default = "default_final_k")]
    pub final_k: usize,
    /// Chunks per upsert batch during ingestion.
    #[serde(default = "default_index_batch_size")]
    pub index_batch_size: usize,
}

fn default_semantic_candidates() -> usize {
    20
}

fn default_semantic_threshold() -> f32 {
    0.25
}

fn default_text_candidates() -> usize {
    20
}

fn default_semantic_weight() -> f64 {
    0.7
}

fn default_text_weight() -> f64 {
    0.3
}

fn default_fusion_k() -> u32 {
    60
}

fn default_use_diversification() -> bool {
    true
}

fn default_mmr_lambda() -> f64 {
    0.6
}

fn default_final_k() -> usize {
    5
}

fn default_index_batch_size() -> usize {
    64
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            semantic_candidates: default_semantic_candidates(),
            semantic_threshold: default_semantic_threshold(),
            text_candidates: default_text_candidates(),
            semantic_weight: default_semantic_weight(),
            text_weight: default_text_weight(),
            fusion_k: default_fusion_k(),
            use_diversification: default_use_diversification(),
            mmr_lambda: default_mmr_lambda(),
            final_k: default_final_k(),
            index_batch_size: default_index_batch_size(),
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if !(0.0..=1.0).contains(&self.semantic_threshold) {
            return Err(RetrievalError::InvalidSettings(format!(
                "semantic_threshold must be in [0, 1], got {}",
                self.semantic_threshold
            )));
        }
        if !self.semantic_weight.is_finite() || self.semantic_weight < 0.0 {
            return Err(RetrievalError::InvalidSettings(format!(
                "semantic_weight must be a non-negative finite number, got {}",
                self.semantic_weight
            )));
        }
        if !self.text_weight.is_finite() || self.text_weight < 0.0 {
            return Err(RetrievalError::InvalidSettings(format!(
                "text_weight must be a non-negative finite number, got {}",
                self.text_weight
            )));
        }
        if self.fusion_k == 0 {
            return Err(RetrievalError::InvalidSettings(
                "fusion_k must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err(RetrievalError::InvalidSettings(format!(
                "mmr_lambda must be in [0, 1], got {}",
                self.mmr_lambda
            )));
        }
        if self.final_k == 0 {
            return Err(RetrievalError::InvalidSettings(
                "final_k must be positive".to_string(),
            ));
        }
        if self.index_batch_size == 0 {
            return Err(RetrievalError::InvalidSettings(
                "index_batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
