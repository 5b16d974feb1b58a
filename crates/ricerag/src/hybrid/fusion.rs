//! Reciprocal Rank Fusion over the semantic and text candidate lists.

use std::cmp::Ordering;
use std::collections::HashMap;

use ricerag_core::{Candidate, ChunkId, RetrievalSettings};

/// Merge two independently-ranked candidate lists into one pool ordered by
/// fused score:
///
/// ```text
/// rrf = semantic_weight * 1/(k + semantic_rank) + text_weight * 1/(k + text_rank)
/// ```
///
/// A chunk absent from a list contributes exactly zero from that list's
/// term, so the two score scales never need to be comparable — only the
/// orderings matter. The output is stable and reproducible: equal fused
/// scores order by presence-in-both-lists first, then by chunk id.
pub fn fuse(
    semantic: Vec<Candidate>,
    text: Vec<Candidate>,
    settings: &RetrievalSettings,
) -> Vec<Candidate> {
    let mut pool: HashMap<ChunkId, Candidate> = HashMap::with_capacity(semantic.len() + text.len());
    for candidate in semantic {
        pool.insert(candidate.chunk.id.clone(), candidate);
    }
    for candidate in text {
        match pool.get_mut(&candidate.chunk.id) {
            Some(existing) => {
                existing.text = candidate.text;
                if existing.vector.is_none() {
                    existing.vector = candidate.vector;
                }
            }
            None => {
                pool.insert(candidate.chunk.id.clone(), candidate);
            }
        }
    }

    let mut fused: Vec<Candidate> = pool
        .into_values()
        .map(|mut candidate| {
            candidate.fused_score = settings.semantic_weight
                * candidate.semantic.reciprocal(settings.fusion_k)
                + settings.text_weight * candidate.text.reciprocal(settings.fusion_k);
            candidate
        })
        .collect();
    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.in_both_lists().cmp(&a.in_both_lists()))
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    fused
}
