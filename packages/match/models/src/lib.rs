#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Match record types and the review lifecycle state machine.
//!
//! A match is a proposed correspondence between exactly one missing-person
//! report and one UIDB record. Matches are created by the scoring engine and
//! mutated only by review actions; re-running the engine produces new match
//! records rather than editing old ones, preserving the audit trail.

use chrono::{DateTime, Utc};
use reunite_case_models::{MissingStatus, UidbStatus};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Review status of a match.
///
/// `Suggested → {UnderReview, Confirmed, Rejected}`,
/// `UnderReview → {Confirmed, Rejected}`; `Confirmed` and `Rejected` are
/// terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    /// Freshly emitted by the engine, awaiting triage.
    Suggested,
    /// Claimed by a reviewer.
    UnderReview,
    /// Accepted; both linked records flip to Matched.
    Confirmed,
    /// Dismissed, either by a reviewer or by a competing confirmation.
    Rejected,
}

impl MatchStatus {
    /// Returns whether this status accepts no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected)
    }

    /// Returns whether a transition from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Suggested,
                Self::UnderReview | Self::Confirmed | Self::Rejected
            ) | (Self::UnderReview, Self::Confirmed | Self::Rejected)
        )
    }

    /// All statuses a reviewer can still act on.
    #[must_use]
    pub const fn open_statuses() -> &'static [Self] {
        &[Self::Suggested, Self::UnderReview]
    }
}

/// An attribute dimension that contributed significantly to a match.
///
/// Listed on the match explanation so reviewers can see which evidence
/// cleared its per-dimension significance threshold.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchedAttribute {
    /// Face embedding similarity.
    FacialFeatures,
    /// Spatial and temporal proximity of last-seen and found events.
    LocationProximity,
    /// Clothing and descriptive text overlap.
    ClothingDescription,
}

impl MatchedAttribute {
    /// Human-readable label shown to reviewers.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FacialFeatures => "Facial features",
            Self::LocationProximity => "Location proximity",
            Self::ClothingDescription => "Clothing match",
        }
    }
}

/// Weight vector for combining the three sub-scores into the aggregate.
///
/// Weights are policy, not algorithm: they are carried through scoring so
/// an audit can reconstruct exactly how an aggregate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreWeights {
    /// Weight of the face sub-score.
    pub face: f64,
    /// Weight of the spatial/temporal sub-score.
    pub metadata: f64,
    /// Weight of the descriptive-text sub-score.
    pub text: f64,
}

impl ScoreWeights {
    /// Tolerance used when checking that weights sum to 1.
    pub const SUM_TOLERANCE: f64 = 1e-6;

    /// Returns whether the weights are each in [0, 1] and sum to 1.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        let in_range =
            |w: f64| (0.0..=1.0).contains(&w);
        in_range(self.face)
            && in_range(self.metadata)
            && in_range(self.text)
            && ((self.face + self.metadata + self.text) - 1.0).abs() <= Self::SUM_TOLERANCE
    }

    /// Combines the three sub-scores into the weighted aggregate.
    #[must_use]
    pub fn combine(&self, face: f64, metadata: f64, text: f64) -> f64 {
        self.face.mul_add(face, self.metadata.mul_add(metadata, self.text * text))
    }
}

/// The three sub-scores and their aggregate, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    /// Visual similarity from face embeddings; 0 when no comparable photo.
    pub face: f64,
    /// Spatial/temporal proximity.
    pub metadata: f64,
    /// Descriptive-attribute overlap.
    pub text: f64,
    /// Weighted aggregate of the three.
    pub overall: f64,
}

/// A match row as stored in and retrieved from the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Record ID (`match-…`).
    pub id: String,
    /// The missing-person side of the pairing.
    pub missing_person_id: String,
    /// The UIDB side of the pairing.
    pub uidb_id: String,
    /// Sub-scores and aggregate.
    pub scores: ScoreBreakdown,
    /// Review status.
    pub status: MatchStatus,
    /// Reviewer identity, once a review action has touched this match.
    pub reviewed_by: Option<String>,
    /// When the terminal review action happened.
    pub reviewed_date: Option<DateTime<Utc>>,
    /// Dimensions that cleared their significance threshold.
    pub matched_attributes: Vec<MatchedAttribute>,
    /// Optimistic-lock counter, bumped on every mutation.
    pub version: i64,
    /// When the engine emitted this match.
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Returns whether this match still counts as a live candidate for
    /// either of its linked records.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Filters for listing candidate matches for an entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchQuery {
    /// Only return matches at or above this aggregate score.
    pub min_score: Option<f64>,
    /// Only return matches in this status.
    pub status: Option<MatchStatus>,
    /// Maximum number of results.
    pub limit: Option<u32>,
}

/// Error returned when a review action violates the lifecycle rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The requested status change is not in the state machine.
    InvalidTransition {
        /// Current status of the match.
        from: MatchStatus,
        /// Requested status.
        to: MatchStatus,
    },
    /// Confirmation or rejection was attempted without a reviewer identity.
    MissingReviewer,
    /// The linked case record cannot move to Matched from its current state.
    CaseNotOpen {
        /// Which record blocked the confirmation (`missing person` / `UIDB`).
        entity: &'static str,
        /// The blocking status, as its wire name.
        status: String,
    },
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid transition {from} -> {to}")
            }
            Self::MissingReviewer => write!(f, "review action requires a reviewer identity"),
            Self::CaseNotOpen { entity, status } => {
                write!(f, "{entity} is {status}, not open for confirmation")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

/// Validates a reviewer-driven status change, without applying it.
///
/// # Errors
///
/// Returns [`TransitionError`] if the reviewer is blank or the state machine
/// forbids the change.
pub fn validate_transition(
    from: MatchStatus,
    to: MatchStatus,
    reviewer: &str,
) -> Result<(), TransitionError> {
    if reviewer.trim().is_empty() {
        return Err(TransitionError::MissingReviewer);
    }
    if !from.can_transition_to(to) {
        return Err(TransitionError::InvalidTransition { from, to });
    }
    Ok(())
}

/// Everything a confirmation must apply atomically.
///
/// The repository executes this plan inside a single transaction: the target
/// match is confirmed, both linked records flip to Matched, and every
/// competing open match is retired. Computing the plan is pure so the
/// retirement invariant can be tested without a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPlan {
    /// The match being confirmed.
    pub confirm_match_id: String,
    /// Expected version of the target match; the repository's optimistic
    /// check fails the whole plan if the row has moved on.
    pub expected_version: i64,
    /// Open matches referencing the same person or the same UIDB record,
    /// to be transitioned to Rejected.
    pub reject_match_ids: Vec<String>,
}

/// Computes the atomic effect of confirming `target`.
///
/// `competing` should contain every match referencing the target's person or
/// UIDB record (the target itself is filtered out, as are matches already in
/// a terminal state).
///
/// # Errors
///
/// Returns [`TransitionError`] if the reviewer is blank, the target is not
/// confirmable, or either linked record is no longer open.
pub fn plan_confirmation(
    target: &MatchRecord,
    person_status: MissingStatus,
    uidb_status: UidbStatus,
    competing: &[MatchRecord],
    reviewer: &str,
) -> Result<ConfirmationPlan, TransitionError> {
    validate_transition(target.status, MatchStatus::Confirmed, reviewer)?;

    if !person_status.can_transition_to(MissingStatus::Matched) {
        return Err(TransitionError::CaseNotOpen {
            entity: "missing person",
            status: person_status.to_string(),
        });
    }
    if !uidb_status.can_transition_to(UidbStatus::Matched) {
        return Err(TransitionError::CaseNotOpen {
            entity: "UIDB record",
            status: uidb_status.to_string(),
        });
    }

    let reject_match_ids = competing
        .iter()
        .filter(|m| {
            m.id != target.id
                && m.is_open()
                && (m.missing_person_id == target.missing_person_id
                    || m.uidb_id == target.uidb_id)
        })
        .map(|m| m.id.clone())
        .collect();

    Ok(ConfirmationPlan {
        confirm_match_id: target.id.clone(),
        expected_version: target.version,
        reject_match_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, person: &str, uidb: &str, status: MatchStatus) -> MatchRecord {
        MatchRecord {
            id: id.to_string(),
            missing_person_id: person.to_string(),
            uidb_id: uidb.to_string(),
            scores: ScoreBreakdown {
                face: 0.92,
                metadata: 0.78,
                text: 0.75,
                overall: 0.844,
            },
            status,
            reviewed_by: None,
            reviewed_date: None,
            matched_attributes: vec![MatchedAttribute::FacialFeatures],
            version: 1,
            created_at: "2024-02-01T00:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn state_machine_terminal_states() {
        assert!(MatchStatus::Confirmed.is_terminal());
        assert!(MatchStatus::Rejected.is_terminal());
        for next in [
            MatchStatus::Suggested,
            MatchStatus::UnderReview,
            MatchStatus::Confirmed,
            MatchStatus::Rejected,
        ] {
            assert!(!MatchStatus::Confirmed.can_transition_to(next));
            assert!(!MatchStatus::Rejected.can_transition_to(next));
        }
    }

    #[test]
    fn state_machine_open_paths() {
        assert!(MatchStatus::Suggested.can_transition_to(MatchStatus::UnderReview));
        assert!(MatchStatus::Suggested.can_transition_to(MatchStatus::Confirmed));
        assert!(MatchStatus::Suggested.can_transition_to(MatchStatus::Rejected));
        assert!(MatchStatus::UnderReview.can_transition_to(MatchStatus::Confirmed));
        assert!(MatchStatus::UnderReview.can_transition_to(MatchStatus::Rejected));
        assert!(!MatchStatus::UnderReview.can_transition_to(MatchStatus::Suggested));
    }

    #[test]
    fn transition_requires_reviewer() {
        let err = validate_transition(MatchStatus::Suggested, MatchStatus::Confirmed, "  ")
            .unwrap_err();
        assert_eq!(err, TransitionError::MissingReviewer);
    }

    #[test]
    fn weights_combine_worked_example() {
        let weights = ScoreWeights {
            face: 0.5,
            metadata: 0.3,
            text: 0.2,
        };
        assert!(weights.is_normalized());
        let overall = weights.combine(0.92, 0.78, 0.75);
        assert!((overall - 0.844).abs() < 1e-12);
    }

    #[test]
    fn weights_must_sum_to_one() {
        let weights = ScoreWeights {
            face: 0.5,
            metadata: 0.3,
            text: 0.3,
        };
        assert!(!weights.is_normalized());
    }

    #[test]
    fn confirmation_plan_retires_competitors_on_both_sides() {
        let target = record("match-1", "mp-1", "uidb-1", MatchStatus::UnderReview);
        let competing = vec![
            // Same person, different body: retired.
            record("match-2", "mp-1", "uidb-2", MatchStatus::Suggested),
            // Same body, different person: retired.
            record("match-3", "mp-2", "uidb-1", MatchStatus::UnderReview),
            // Unrelated pairing: untouched.
            record("match-4", "mp-3", "uidb-3", MatchStatus::Suggested),
            // Already terminal: untouched.
            record("match-5", "mp-1", "uidb-4", MatchStatus::Rejected),
        ];

        let plan = plan_confirmation(
            &target,
            MissingStatus::Active,
            UidbStatus::Unidentified,
            &competing,
            "insp-rajesh",
        )
        .unwrap();

        assert_eq!(plan.confirm_match_id, "match-1");
        assert_eq!(plan.expected_version, 1);
        assert_eq!(plan.reject_match_ids, vec!["match-2", "match-3"]);
    }

    #[test]
    fn confirming_terminal_match_is_invalid() {
        let target = record("match-1", "mp-1", "uidb-1", MatchStatus::Rejected);
        let err = plan_confirmation(
            &target,
            MissingStatus::Active,
            UidbStatus::Unidentified,
            &[],
            "insp-rajesh",
        )
        .unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: MatchStatus::Rejected,
                to: MatchStatus::Confirmed,
            }
        );
    }

    #[test]
    fn racing_confirm_loses_after_competitor_wins() {
        // Two candidates share uidb-1. The first confirmation retires the
        // second and flips the records; replanning the loser must fail on
        // its new state, never double-confirm.
        let winner = record("match-1", "mp-1", "uidb-1", MatchStatus::Suggested);
        let mut loser = record("match-2", "mp-2", "uidb-1", MatchStatus::Suggested);

        let plan = plan_confirmation(
            &winner,
            MissingStatus::Active,
            UidbStatus::Unidentified,
            std::slice::from_ref(&loser),
            "insp-a",
        )
        .unwrap();
        assert_eq!(plan.reject_match_ids, vec!["match-2"]);

        // State after the winner's plan applies.
        loser.status = MatchStatus::Rejected;
        let err = plan_confirmation(
            &loser,
            MissingStatus::Active,
            UidbStatus::Matched,
            &[],
            "insp-b",
        )
        .unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: MatchStatus::Rejected,
                to: MatchStatus::Confirmed,
            }
        );
    }

    #[test]
    fn confirming_against_matched_uidb_is_blocked() {
        let target = record("match-1", "mp-1", "uidb-1", MatchStatus::Suggested);
        let err = plan_confirmation(
            &target,
            MissingStatus::Active,
            UidbStatus::Matched,
            &[],
            "insp-rajesh",
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::CaseNotOpen { entity, .. } if entity == "UIDB record"));
    }

    #[test]
    fn confirming_against_closed_person_is_blocked() {
        let target = record("match-1", "mp-1", "uidb-1", MatchStatus::Suggested);
        let err = plan_confirmation(
            &target,
            MissingStatus::Closed,
            UidbStatus::Unidentified,
            &[],
            "insp-rajesh",
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::CaseNotOpen { entity, .. } if entity == "missing person"));
    }
}
