//! Transient retrieval bookkeeping attached to chunks during one call.

use crate::chunk::Chunk;

/// Position of a chunk within one stage's ranked list.
///
/// A chunk missing from a list is `Absent` and contributes exactly zero to
/// the fused score. Sentinel ranks (0, `usize::MAX`) are deliberately not
/// used: the tagged variant keeps the fusion arithmetic honest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rank {
    Absent,
    /// 1-based rank and the stage's own score.
    Present { rank: usize, score: f32 },
}

impl Rank {
    pub fn present(rank: usize, score: f32) -> Self {
        debug_assert!(rank >= 1, "ranks are 1-based");
        Rank::Present { rank, score }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Rank::Present { .. })
    }

    /// The reciprocal-rank term `1 / (k + rank)`; zero when absent.
    pub fn reciprocal(&self, k: u32) -> f64 {
        match self {
            Rank::Absent => 0.0,
            Rank::Present { rank, .. } => 1.0 / (f64::from(k) + *rank as f64),
        }
    }
}

/// A chunk annotated with per-call retrieval state. Exists only for the
/// duration of one retrieval call; never persisted.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: Chunk,
    /// Stored embedding, when the backend returned it with the hit.
    pub vector: Option<Vec<f32>>,
    pub semantic: Rank,
    pub text: Rank,
    pub fused_score: f64,
}

impl Candidate {
    pub fn from_semantic(chunk: Chunk, vector: Option<Vec<f32>>, rank: usize, score: f32) -> Self {
        Self {
            chunk,
            vector,
            semantic: Rank::present(rank, score),
            text: Rank::Absent,
            fused_score: 0.0,
        }
    }

    pub fn from_text(chunk: Chunk, vector: Option<Vec<f32>>, rank: usize, score: f32) -> Self {
        Self {
            chunk,
            vector,
            semantic: Rank::Absent,
            text: Rank::present(rank, score),
            fused_score: 0.0,
        }
    }

    pub fn in_both_lists(&self) -> bool {
        self.semantic.is_present() && self.text.is_present()
    }
}
