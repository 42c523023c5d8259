//! Applies batch re-match plans to the repository.
//!
//! Planning (in `reunite_engine::batch`) is pure; this module turns each
//! planned action into rows. Actions apply pair by pair, so a sweep killed
//! partway through leaves only complete match records — the next sweep's
//! reconciliation picks up where it stopped.

use chrono::Utc;
use reunite_engine::MatchCandidate;
use reunite_engine::batch::{PlannedAction, RematchPlan, SYSTEM_REVIEWER};
use reunite_match_models::{MatchRecord, MatchStatus};
use switchy_database::Database;
use uuid::Uuid;

use crate::review::{MatchReviewer, ReviewError};
use crate::queries;

/// Counts of what a sweep actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RematchSummary {
    /// New Suggested matches inserted.
    pub inserted: u64,
    /// Open candidates retired in favor of a higher-scoring re-run.
    pub superseded: u64,
}

fn record_from_candidate(candidate: &MatchCandidate) -> MatchRecord {
    MatchRecord {
        id: format!("match-{}", Uuid::new_v4()),
        missing_person_id: candidate.missing_person_id.clone(),
        uidb_id: candidate.uidb_id.clone(),
        scores: candidate.scores,
        status: MatchStatus::Suggested,
        reviewed_by: None,
        reviewed_date: None,
        matched_attributes: candidate.matched_attributes.clone(),
        version: 1,
        created_at: Utc::now(),
    }
}

/// Applies every action in `plan`.
///
/// Retirements go through the reviewer under the [`SYSTEM_REVIEWER`]
/// identity so they carry the same audit fields as a human rejection. A
/// retirement that loses a race to a human review is logged and skipped;
/// the replacement insert still happens.
///
/// # Errors
///
/// Returns [`ReviewError`] if an insert fails. Per-pair retirement
/// conflicts are not errors.
pub async fn apply_rematch_plan(
    db: &dyn Database,
    reviewer: &MatchReviewer,
    plan: &RematchPlan,
) -> Result<RematchSummary, ReviewError> {
    let mut summary = RematchSummary::default();

    for action in &plan.actions {
        match action {
            PlannedAction::Insert(candidate) => {
                queries::insert_match(db, &record_from_candidate(candidate)).await?;
                summary.inserted += 1;
            }
            PlannedAction::Supersede {
                retire_match_ids,
                candidate,
            } => {
                for retire_id in retire_match_ids {
                    match reviewer.reject(retire_id, SYSTEM_REVIEWER).await {
                        Ok(_) => summary.superseded += 1,
                        Err(
                            ReviewError::Transition(_) | ReviewError::ConcurrentModification { .. },
                        ) => {
                            log::warn!(
                                "Match {retire_id} changed during the sweep; leaving it as-is"
                            );
                        }
                        Err(e) => return Err(e),
                    }
                }
                queries::insert_match(db, &record_from_candidate(candidate)).await?;
                summary.inserted += 1;
            }
        }
    }

    Ok(summary)
}
