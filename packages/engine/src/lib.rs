#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Scoring engine for candidate matches between missing-person reports and
//! UIDB records.
//!
//! The engine is stateless: scoring one pair touches nothing outside its
//! inputs, so different pairs can be scored in any order or fully in
//! parallel. Emitting a scored candidate into the repository is the only
//! synchronization point, and it happens outside this crate.

pub mod batch;
pub mod config;
pub mod face;
pub mod metadata;
pub mod text;

use reunite_case_models::{MissingPerson, UidbRecord};
use reunite_match_models::{MatchedAttribute, ScoreBreakdown, ScoreWeights};

pub use config::{Confidence, ConfigError, MatchConfig};

/// Errors produced while scoring a pair.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A record is missing required identity fields. Optional fields
    /// (photos, notes) never trigger this — they degrade sub-scores.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the missing field.
        message: String,
    },
}

/// A scored candidate ready for insertion as a Suggested match.
///
/// Carries the weight vector that produced the aggregate so the audit trail
/// can reconstruct the score after weights are retuned.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    /// The missing-person side of the pairing.
    pub missing_person_id: String,
    /// The UIDB side of the pairing.
    pub uidb_id: String,
    /// Sub-scores and aggregate.
    pub scores: ScoreBreakdown,
    /// Dimensions that cleared their significance threshold.
    pub matched_attributes: Vec<MatchedAttribute>,
    /// The weight vector used for the aggregate.
    pub weights: ScoreWeights,
}

fn require_identity(field: &str, value: &str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::InvalidInput {
            message: format!("{field} must be present"),
        });
    }
    Ok(())
}

/// Combines sub-scores into an aggregate and decides emission.
///
/// Returns `None` when the aggregate falls below the candidate threshold;
/// otherwise the breakdown plus the explanation of which dimensions cleared
/// their significance thresholds.
#[must_use]
pub fn finalize(
    config: &MatchConfig,
    face: f64,
    metadata: f64,
    text: f64,
) -> Option<(ScoreBreakdown, Vec<MatchedAttribute>)> {
    let overall = config.weights.combine(face, metadata, text).clamp(0.0, 1.0);

    if overall < config.min_candidate_threshold {
        return None;
    }

    let mut matched_attributes = Vec::new();
    if face >= config.face_significance {
        matched_attributes.push(MatchedAttribute::FacialFeatures);
    }
    if metadata >= config.metadata_significance {
        matched_attributes.push(MatchedAttribute::LocationProximity);
    }
    if text >= config.text_significance {
        matched_attributes.push(MatchedAttribute::ClothingDescription);
    }

    Some((
        ScoreBreakdown {
            face,
            metadata,
            text,
            overall,
        },
        matched_attributes,
    ))
}

/// Scores one (missing person, UIDB) pair.
///
/// Returns `Ok(None)` when the pair does not clear the candidate threshold.
/// Missing photos degrade the face sub-score to 0.0; empty descriptive text
/// degrades the text sub-score; neither is an error.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] when either record lacks required
/// identity fields.
pub fn score_pair(
    config: &MatchConfig,
    person: &MissingPerson,
    uidb: &UidbRecord,
) -> Result<Option<MatchCandidate>, EngineError> {
    require_identity("missing person id", &person.id)?;
    require_identity("missing person name", &person.name)?;
    require_identity("UIDB id", &uidb.id)?;
    require_identity("UIDB case number", &uidb.case_number)?;

    let face = face::face_score(&person.photos, &uidb.photos);
    let metadata = metadata::metadata_score(
        config,
        &person.last_seen,
        person.last_seen_date,
        &uidb.found,
        uidb.found_date,
    );
    let text = text::text_score(
        &[&person.clothing, &person.notes],
        &[&uidb.clothing, &uidb.injuries],
    );

    Ok(finalize(config, face, metadata, text).map(|(scores, matched_attributes)| {
        MatchCandidate {
            missing_person_id: person.id.clone(),
            uidb_id: uidb.id.clone(),
            scores,
            matched_attributes,
            weights: config.weights,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reunite_case_models::{
        BodyCondition, CasePhoto, Gender, GeoPoint, MissingStatus, UidbStatus,
    };

    pub(crate) fn person(id: &str) -> MissingPerson {
        MissingPerson {
            id: id.to_string(),
            name: "Rahul Sharma".to_string(),
            age: 28,
            gender: Gender::Male,
            photos: Vec::new(),
            clothing: "Blue jeans, white t-shirt".to_string(),
            notes: String::new(),
            last_seen: GeoPoint::new(28.6139, 77.209, "Connaught Place, New Delhi".to_string()),
            last_seen_date: "2024-01-15T00:00:00Z".parse().unwrap(),
            fir_number: "FIR/2024/001".to_string(),
            reported_by: "Family Member".to_string(),
            reported_date: "2024-01-16T00:00:00Z".parse().unwrap(),
            station_id: "station-001".to_string(),
            status: MissingStatus::Active,
        }
    }

    /// Default weights put half the mass on the face dimension, so
    /// photo-less fixtures need a policy tuned to accept
    /// metadata/text-only candidates.
    pub(crate) fn low_threshold_config() -> MatchConfig {
        MatchConfig {
            min_candidate_threshold: 0.25,
            ..MatchConfig::default()
        }
    }

    pub(crate) fn uidb(id: &str) -> UidbRecord {
        UidbRecord {
            id: id.to_string(),
            case_number: "UIDB/2024/001".to_string(),
            photos: Vec::new(),
            condition: BodyCondition::Decomposed,
            clothing: "Blue jeans, white shirt".to_string(),
            injuries: "Head trauma".to_string(),
            found: GeoPoint::new(28.5355, 77.391, "Noida Sector 62".to_string()),
            found_date: "2024-01-25T00:00:00Z".parse().unwrap(),
            post_mortem_report: None,
            station_id: "station-003".to_string(),
            status: UidbStatus::Unidentified,
        }
    }

    #[test]
    fn worked_example_aggregate() {
        // face 0.92, metadata 0.78, text 0.75 with weights (0.5, 0.3, 0.2)
        // must aggregate to 0.844 and clear the 0.5 threshold.
        let config = MatchConfig::default();
        let (scores, attributes) = finalize(&config, 0.92, 0.78, 0.75).unwrap();

        assert!((scores.overall - 0.844).abs() < 1e-12);
        assert_eq!(
            attributes,
            vec![
                reunite_match_models::MatchedAttribute::FacialFeatures,
                reunite_match_models::MatchedAttribute::LocationProximity,
                reunite_match_models::MatchedAttribute::ClothingDescription,
            ]
        );
        assert_eq!(MatchConfig::confidence(scores.overall), Confidence::High);
    }

    #[test]
    fn below_threshold_emits_nothing() {
        let config = MatchConfig::default();
        assert!(finalize(&config, 0.1, 0.2, 0.1).is_none());
    }

    #[test]
    fn photoless_pair_can_still_match_on_metadata_and_text() {
        let config = low_threshold_config();
        let candidate = score_pair(&config, &person("mp-1"), &uidb("uidb-1"))
            .unwrap()
            .expect("metadata + text alone should clear the threshold here");

        assert!((candidate.scores.face - 0.0).abs() < f64::EPSILON);
        assert!(candidate.scores.metadata > 0.0);
        assert!(candidate.scores.text > 0.0);
        assert!(candidate.scores.overall >= config.min_candidate_threshold);
        assert!(!candidate
            .matched_attributes
            .contains(&reunite_match_models::MatchedAttribute::FacialFeatures));
    }

    #[test]
    fn matching_photos_raise_the_face_score() {
        let config = MatchConfig::default();
        let embedding = face::embed_photo(b"same source image");

        let mut p = person("mp-1");
        p.photos = vec![CasePhoto {
            uri: "s3://photos/a.jpg".to_string(),
            embedding: Some(embedding.clone()),
        }];
        let mut u = uidb("uidb-1");
        u.photos = vec![CasePhoto {
            uri: "s3://photos/b.jpg".to_string(),
            embedding: Some(embedding),
        }];

        let candidate = score_pair(&config, &p, &u).unwrap().unwrap();
        assert!((candidate.scores.face - 1.0).abs() < 1e-9);
        assert!(candidate
            .matched_attributes
            .contains(&reunite_match_models::MatchedAttribute::FacialFeatures));
    }

    #[test]
    fn blank_identity_fields_are_invalid_input() {
        let config = MatchConfig::default();
        let mut p = person("mp-1");
        p.name = String::new();
        let err = score_pair(&config, &p, &uidb("uidb-1")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { .. }));

        let mut u = uidb("uidb-1");
        u.case_number = "  ".to_string();
        let err = score_pair(&config, &person("mp-1"), &u).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { .. }));
    }

    #[test]
    fn candidate_carries_the_weight_vector() {
        let config = low_threshold_config();
        let candidate = score_pair(&config, &person("mp-1"), &uidb("uidb-1"))
            .unwrap()
            .unwrap();
        assert_eq!(candidate.weights, config.weights);
    }
}
