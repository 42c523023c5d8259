//! Descriptive-text sub-score.
//!
//! Normalization is applied symmetrically to both sides of the comparison,
//! so the score is symmetric by construction and case has no effect.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Characters that carry no descriptive signal.
static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Normalizes free text into a token set: lowercase, punctuation stripped,
/// whitespace-split.
#[must_use]
pub fn normalize_tokens(parts: &[&str]) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for part in parts {
        let lowered = part.to_lowercase();
        for token in NON_WORD_RE.split(&lowered) {
            if !token.is_empty() {
                tokens.insert(token.to_string());
            }
        }
    }
    tokens
}

/// Jaccard overlap of the normalized token sets drawn from the two sides'
/// clothing and descriptive text, in [0, 1].
///
/// Symmetric and case-insensitive; two empty sides score 0.0.
#[must_use]
pub fn text_score(a_parts: &[&str], b_parts: &[&str]) -> f64 {
    let a = normalize_tokens(a_parts);
    let b = normalize_tokens(b_parts);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();

    #[allow(clippy::cast_precision_loss)]
    let score = intersection as f64 / union as f64;
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_for_all_pairs() {
        let pairs = [
            ("Blue jeans, white t-shirt", "blue jeans and white shirt"),
            ("Red saree", "red saree, gold border"),
            ("", "anything"),
            ("Torn kurta", "TORN KURTA"),
        ];
        for (a, b) in pairs {
            let forward = text_score(&[a], &[b]);
            let backward = text_score(&[b], &[a]);
            assert!((forward - backward).abs() < 1e-12, "asymmetric for {a:?} / {b:?}");
        }
    }

    #[test]
    fn case_insensitive() {
        let lower = text_score(&["blue jeans"], &["blue jeans"]);
        let mixed = text_score(&["Blue JEANS"], &["bLuE jeans"]);
        assert!((lower - mixed).abs() < 1e-12);
        assert!((lower - 1.0).abs() < 1e-12);
    }

    #[test]
    fn punctuation_does_not_count() {
        let score = text_score(&["blue jeans, white t-shirt"], &["blue jeans; white t shirt"]);
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn partial_overlap_is_fractional() {
        // {blue, jeans, white, t, shirt} vs {blue, jeans, red, shirt}:
        // intersection 3, union 6.
        let score = text_score(&["blue jeans white t shirt"], &["blue jeans red shirt"]);
        assert!((score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_sides_score_zero() {
        assert!((text_score(&[], &[]) - 0.0).abs() < f64::EPSILON);
        assert!((text_score(&["clothing"], &[""]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn multiple_parts_pool_into_one_set() {
        let score = text_score(
            &["blue jeans", "scar on left arm"],
            &["blue jeans", "scar on left arm"],
        );
        assert!((score - 1.0).abs() < 1e-12);
    }
}
