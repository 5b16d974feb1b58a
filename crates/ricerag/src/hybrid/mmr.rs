//! Maximal Marginal Relevance selection over the fused pool.

use ricerag_core::{cosine_similarity, Candidate};

/// Greedily select up to `k` candidates, trading fused-score relevance
/// against similarity to what was already picked:
///
/// ```text
/// mmr(c) = lambda * relevance(c) - (1 - lambda) * max_sim(c, selected)
/// ```
///
/// `relevance` is the fused score min-max normalized over the pool;
/// `max_sim` is the highest cosine similarity to any selected chunk. The
/// pool must arrive sorted by fused score descending; the selection seeds
/// with its head. Candidates without a stored vector cannot participate in
/// the similarity term — they are appended after the diversified picks, and
/// only while `k` is unfilled.
pub fn diversify(pool: Vec<Candidate>, k: usize, lambda: f64) -> Vec<Candidate> {
    if k == 0 || pool.is_empty() {
        return Vec::new();
    }
    let (mut remaining, vectorless): (Vec<Candidate>, Vec<Candidate>) = pool
        .into_iter()
        .partition(|candidate| candidate.vector.is_some());

    let max = remaining
        .iter()
        .map(|c| c.fused_score)
        .fold(f64::NEG_INFINITY, f64::max);
    let min = remaining
        .iter()
        .map(|c| c.fused_score)
        .fold(f64::INFINITY, f64::min);
    let range = max - min;
    let relevance =
        |score: f64| -> f64 { if range > 0.0 { (score - min) / range } else { 1.0 } };

    let mut selected: Vec<Candidate> = Vec::with_capacity(k.min(remaining.len()));
    if !remaining.is_empty() {
        selected.push(remaining.remove(0));
    }
    while selected.len() < k && !remaining.is_empty() {
        let mut best_index = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (index, candidate) in remaining.iter().enumerate() {
            let vector = candidate.vector.as_deref().unwrap_or_default();
            let redundancy = selected
                .iter()
                .filter_map(|picked| picked.vector.as_deref())
                .map(|picked| f64::from(cosine_similarity(vector, picked)))
                .fold(f64::NEG_INFINITY, f64::max);
            let redundancy = if redundancy.is_finite() { redundancy } else { 0.0 };
            let score = lambda * relevance(candidate.fused_score) - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }
        selected.push(remaining.remove(best_index));
    }

    for candidate in vectorless {
        if selected.len() >= k {
            break;
        }
        selected.push(candidate);
    }
    selected
}
