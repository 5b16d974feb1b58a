//! Client-side text relevance scoring.
//!
//! The backend's text filter decides membership; ordering comes from this
//! occurrence-frequency score. Monotone in term frequency, which is all rank
//! fusion needs — the scale is never compared against semantic scores.

/// Occurrences of each query term in `content`, normalized by content token
/// count. Case-insensitive substring matching; zero when no term occurs.
pub(crate) fn text_match_score(content: &str, query: &str) -> f32 {
    let haystack = content.to_lowercase();
    let needle = query.to_lowercase();
    let mut total = 0usize;
    for term in needle.split_whitespace() {
        total += haystack.matches(term).count();
    }
    if total == 0 {
        return 0.0;
    }
    let tokens = haystack.split_whitespace().count().max(1);
    total as f32 / tokens as f32
}
