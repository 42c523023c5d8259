//! Batch re-match planning.
//!
//! A sweep scores the full cross product of open missing-person reports and
//! open UIDB records, then reconciles each candidate against the matches
//! already on file for that pair. Planning is pure: the caller fetches the
//! inputs, runs the plan, and applies the resulting actions pair by pair, so
//! an interrupted sweep leaves only complete match records behind.
//!
//! Failures are collected per pair and never abort the rest of the sweep.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use reunite_case_models::{MissingPerson, UidbRecord};
use reunite_match_models::{MatchRecord, MatchStatus};

use crate::{EngineError, MatchCandidate, MatchConfig, score_pair};

/// Reviewer identity recorded when the sweep itself retires a match
/// (a higher-scoring re-run superseding an open candidate).
pub const SYSTEM_REVIEWER: &str = "system:rematch";

/// A per-pair scoring failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairFailure {
    /// The missing-person side of the failed pair.
    pub missing_person_id: String,
    /// The UIDB side of the failed pair.
    pub uidb_id: String,
    /// What went wrong.
    pub message: String,
}

/// One reconciliation step the caller must apply.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedAction {
    /// Insert the candidate as a new Suggested match.
    Insert(MatchCandidate),
    /// Insert the candidate and retire the open matches it out-scored,
    /// keeping exactly one live candidate per pair.
    Supersede {
        /// Open matches for the same pair with lower aggregates.
        retire_match_ids: Vec<String>,
        /// The replacement candidate.
        candidate: MatchCandidate,
    },
}

/// Outcome of planning one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RematchPlan {
    /// Actions to apply, in pair order.
    pub actions: Vec<PlannedAction>,
    /// Per-pair failures, reported alongside the actions.
    pub failures: Vec<PairFailure>,
    /// Pairs actually scored.
    pub scored_pairs: u64,
    /// Pairs skipped (below threshold, duplicate of an existing candidate,
    /// or suppressed by an earlier rejection).
    pub skipped_pairs: u64,
    /// Whether the sweep stopped early on the cancellation flag.
    pub cancelled: bool,
}

/// Matches on file for one (person, UIDB) pair.
#[derive(Default)]
struct PairHistory<'a> {
    open: Vec<&'a MatchRecord>,
    confirmed: bool,
    best_rejected: f64,
    any_rejected: bool,
}

fn index_existing(existing: &[MatchRecord]) -> BTreeMap<(&str, &str), PairHistory<'_>> {
    let mut index: BTreeMap<(&str, &str), PairHistory<'_>> = BTreeMap::new();
    for record in existing {
        let entry = index
            .entry((record.missing_person_id.as_str(), record.uidb_id.as_str()))
            .or_default();
        match record.status {
            MatchStatus::Suggested | MatchStatus::UnderReview => entry.open.push(record),
            MatchStatus::Confirmed => entry.confirmed = true,
            MatchStatus::Rejected => {
                entry.any_rejected = true;
                entry.best_rejected = entry.best_rejected.max(record.scores.overall);
            }
        }
    }
    index
}

/// Reconciles a fresh candidate against the pair's history.
///
/// Rules, in order: a confirmed pair is settled and never re-suggested; an
/// open candidate is kept unless the new score strictly beats every open
/// one (then they are superseded); a pair every reviewer has already
/// rejected comes back only on a strictly better score than any rejection.
fn reconcile(candidate: MatchCandidate, history: Option<&PairHistory<'_>>) -> Option<PlannedAction> {
    let Some(history) = history else {
        return Some(PlannedAction::Insert(candidate));
    };

    if history.confirmed {
        return None;
    }

    if !history.open.is_empty() {
        let best_open = history
            .open
            .iter()
            .map(|m| m.scores.overall)
            .fold(f64::MIN, f64::max);
        if candidate.scores.overall > best_open {
            return Some(PlannedAction::Supersede {
                retire_match_ids: history.open.iter().map(|m| m.id.clone()).collect(),
                candidate,
            });
        }
        return None;
    }

    if history.any_rejected && candidate.scores.overall <= history.best_rejected {
        return None;
    }

    Some(PlannedAction::Insert(candidate))
}

/// Plans a full re-match sweep.
///
/// Only open records participate: persons must be Active and UIDB records
/// Unidentified. The `cancel` flag is checked between pairs; a cancelled
/// plan carries every action computed so far and `cancelled = true`.
#[must_use]
pub fn plan_rematch(
    config: &MatchConfig,
    persons: &[MissingPerson],
    uidbs: &[UidbRecord],
    existing: &[MatchRecord],
    cancel: &AtomicBool,
) -> RematchPlan {
    let index = index_existing(existing);
    let mut plan = RematchPlan::default();

    'sweep: for person in persons {
        if !matches!(person.status, reunite_case_models::MissingStatus::Active) {
            continue;
        }
        for uidb in uidbs {
            if !uidb.status.is_open() {
                continue;
            }
            if cancel.load(Ordering::Relaxed) {
                plan.cancelled = true;
                break 'sweep;
            }

            plan.scored_pairs += 1;
            match score_pair(config, person, uidb) {
                Ok(Some(candidate)) => {
                    let history = index.get(&(person.id.as_str(), uidb.id.as_str()));
                    match reconcile(candidate, history) {
                        Some(action) => plan.actions.push(action),
                        None => plan.skipped_pairs += 1,
                    }
                }
                Ok(None) => plan.skipped_pairs += 1,
                Err(EngineError::InvalidInput { message }) => {
                    log::warn!(
                        "Skipping pair ({}, {}): {message}",
                        person.id,
                        uidb.id
                    );
                    plan.failures.push(PairFailure {
                        missing_person_id: person.id.clone(),
                        uidb_id: uidb.id.clone(),
                        message,
                    });
                }
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use reunite_case_models::{MissingStatus, UidbStatus};
    use reunite_match_models::{MatchedAttribute, ScoreBreakdown};

    fn person(id: &str) -> MissingPerson {
        crate::tests::person(id)
    }

    fn config() -> MatchConfig {
        crate::tests::low_threshold_config()
    }

    fn uidb(id: &str) -> UidbRecord {
        crate::tests::uidb(id)
    }

    fn existing(id: &str, person: &str, uidb: &str, status: MatchStatus, overall: f64) -> MatchRecord {
        MatchRecord {
            id: id.to_string(),
            missing_person_id: person.to_string(),
            uidb_id: uidb.to_string(),
            scores: ScoreBreakdown {
                face: 0.0,
                metadata: overall,
                text: overall,
                overall,
            },
            status,
            reviewed_by: None,
            reviewed_date: None,
            matched_attributes: vec![MatchedAttribute::LocationProximity],
            version: 1,
            created_at: "2024-02-01T00:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn fresh_pair_yields_insert() {
        let config = config();
        let plan = plan_rematch(
            &config,
            &[person("mp-1")],
            &[uidb("uidb-1")],
            &[],
            &AtomicBool::new(false),
        );

        assert_eq!(plan.actions.len(), 1);
        assert!(matches!(plan.actions[0], PlannedAction::Insert(_)));
        assert!(plan.failures.is_empty());
        assert!(!plan.cancelled);
    }

    #[test]
    fn closed_records_are_not_scored() {
        let config = config();
        let mut p = person("mp-1");
        p.status = MissingStatus::Closed;
        let mut u = uidb("uidb-1");
        u.status = UidbStatus::Identified;

        let plan = plan_rematch(
            &config,
            &[p, person("mp-2")],
            &[u],
            &[],
            &AtomicBool::new(false),
        );
        assert_eq!(plan.scored_pairs, 0);
        assert!(plan.actions.is_empty());
    }

    #[test]
    fn existing_higher_candidate_suppresses_duplicate() {
        let config = config();
        let on_file = existing("match-1", "mp-1", "uidb-1", MatchStatus::Suggested, 0.99);

        let plan = plan_rematch(
            &config,
            &[person("mp-1")],
            &[uidb("uidb-1")],
            std::slice::from_ref(&on_file),
            &AtomicBool::new(false),
        );
        assert!(plan.actions.is_empty());
        assert_eq!(plan.skipped_pairs, 1);
    }

    #[test]
    fn better_score_supersedes_open_candidate() {
        let config = config();
        let on_file = existing("match-1", "mp-1", "uidb-1", MatchStatus::Suggested, 0.30);

        let plan = plan_rematch(
            &config,
            &[person("mp-1")],
            &[uidb("uidb-1")],
            std::slice::from_ref(&on_file),
            &AtomicBool::new(false),
        );

        assert_eq!(plan.actions.len(), 1);
        match &plan.actions[0] {
            PlannedAction::Supersede {
                retire_match_ids,
                candidate,
            } => {
                assert_eq!(retire_match_ids, &["match-1".to_string()]);
                assert!(candidate.scores.overall > 0.30);
            }
            other => panic!("expected supersede, got {other:?}"),
        }
    }

    #[test]
    fn confirmed_pair_is_never_resuggested() {
        let config = config();
        let on_file = existing("match-1", "mp-1", "uidb-1", MatchStatus::Confirmed, 0.9);

        let plan = plan_rematch(
            &config,
            &[person("mp-1")],
            &[uidb("uidb-1")],
            std::slice::from_ref(&on_file),
            &AtomicBool::new(false),
        );
        assert!(plan.actions.is_empty());
    }

    #[test]
    fn rejected_pair_needs_a_strictly_better_score() {
        let config = config();
        let rejected_high = existing("match-1", "mp-1", "uidb-1", MatchStatus::Rejected, 0.99);

        let plan = plan_rematch(
            &config,
            &[person("mp-1")],
            &[uidb("uidb-1")],
            std::slice::from_ref(&rejected_high),
            &AtomicBool::new(false),
        );
        assert!(plan.actions.is_empty());

        let rejected_low = existing("match-1", "mp-1", "uidb-1", MatchStatus::Rejected, 0.01);
        let plan = plan_rematch(
            &config,
            &[person("mp-1")],
            &[uidb("uidb-1")],
            std::slice::from_ref(&rejected_low),
            &AtomicBool::new(false),
        );
        assert_eq!(plan.actions.len(), 1);
    }

    #[test]
    fn invalid_record_fails_its_pairs_only() {
        let config = config();
        let mut broken = person("mp-broken");
        broken.name = String::new();

        let plan = plan_rematch(
            &config,
            &[broken, person("mp-1")],
            &[uidb("uidb-1")],
            &[],
            &AtomicBool::new(false),
        );

        assert_eq!(plan.failures.len(), 1);
        assert_eq!(plan.failures[0].missing_person_id, "mp-broken");
        assert_eq!(plan.actions.len(), 1);
    }

    #[test]
    fn cancellation_stops_between_pairs() {
        let config = config();
        let cancel = AtomicBool::new(true);

        let plan = plan_rematch(
            &config,
            &[person("mp-1"), person("mp-2")],
            &[uidb("uidb-1")],
            &[],
            &cancel,
        );

        assert!(plan.cancelled);
        assert!(plan.actions.is_empty());
        assert_eq!(plan.scored_pairs, 0);
    }
}
