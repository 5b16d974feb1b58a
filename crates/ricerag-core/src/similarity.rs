//! Vector similarity primitives shared by diversification and the
//! in-memory backend.

/// Cosine similarity between two vectors.
///
/// Stored embeddings are normalized, but the norm guard keeps degenerate
/// (zero or mismatched-length) vectors at similarity 0 instead of NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}
