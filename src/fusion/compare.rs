use strsim::normalized_levenshtein;

/// Character-level agreement between two engines' readings of one line.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b).clamp(0.0, 1.0)
}
