//! Face sub-score from photo embeddings.
//!
//! Photos are reduced to fixed-dimension unit-interval vectors. The digest
//! embedder below is the deterministic fallback pipeline stage: identical
//! image bytes always produce identical embeddings, so identical photo
//! inputs always produce identical scores. A model-backed embedder writes
//! into the same [`CasePhoto::embedding`] slot at upload time, so swapping
//! it in changes no scoring code.

use reunite_case_models::CasePhoto;
use sha2::{Digest, Sha256};

/// Dimension of the embedding vectors produced by [`embed_photo`].
pub const EMBEDDING_DIM: usize = 32;

/// Embeds image bytes into a deterministic unit-interval vector.
///
/// The SHA-256 digest of the bytes is spread across [`EMBEDDING_DIM`]
/// components in [0, 1].
#[must_use]
pub fn embed_photo(bytes: &[u8]) -> Vec<f32> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();

    digest
        .iter()
        .take(EMBEDDING_DIM)
        .map(|&b| f32::from(b) / 255.0)
        .collect()
}

/// Cosine similarity between two embeddings, or `None` when the vectors are
/// empty, mismatched in length, or degenerate (zero norm).
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some(dot / denom)
}

/// Face sub-score for two photo sets: the best pairwise embedding
/// similarity, clamped to [0, 1].
///
/// Photos without an embedding are skipped. When either side has no
/// embedded photo at all, the score is the defined floor of 0.0 — missing
/// photos degrade, they never error.
#[must_use]
pub fn face_score(person_photos: &[CasePhoto], uidb_photos: &[CasePhoto]) -> f64 {
    let mut best = 0.0f64;

    for person_photo in person_photos {
        let Some(person_embedding) = &person_photo.embedding else {
            continue;
        };
        for uidb_photo in uidb_photos {
            let Some(uidb_embedding) = &uidb_photo.embedding else {
                continue;
            };
            if let Some(similarity) = cosine_similarity(person_embedding, uidb_embedding) {
                best = best.max(similarity);
            }
        }
    }

    best.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(embedding: Option<Vec<f32>>) -> CasePhoto {
        CasePhoto {
            uri: "s3://photos/test.jpg".to_string(),
            embedding,
        }
    }

    #[test]
    fn embedding_is_deterministic_and_bounded() {
        let a = embed_photo(b"same image bytes");
        let b = embed_photo(b"same image bytes");
        let c = embed_photo(b"different image bytes");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), EMBEDDING_DIM);
        assert!(a.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn identical_photos_score_one() {
        let embedding = embed_photo(b"forensic photo");
        let score = face_score(
            &[photo(Some(embedding.clone()))],
            &[photo(Some(embedding))],
        );
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn photoless_pair_scores_zero() {
        assert!((face_score(&[], &[]) - 0.0).abs() < f64::EPSILON);
        assert!((face_score(&[photo(None)], &[photo(None)]) - 0.0).abs() < f64::EPSILON);
        let embedded = photo(Some(embed_photo(b"img")));
        assert!((face_score(&[embedded], &[]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn best_pair_wins_across_photo_sets() {
        let shared = embed_photo(b"shared");
        let person = vec![photo(Some(embed_photo(b"other"))), photo(Some(shared.clone()))];
        let uidb = vec![photo(Some(shared))];
        let score = face_score(&person, &uidb);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mismatched_dimensions_are_ignored() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0]).is_none());
        assert!(cosine_similarity(&[], &[]).is_none());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_none());
    }
}
