//! Review lifecycle transactions.
//!
//! [`MatchReviewer`] owns a dedicated database connection and serializes all
//! review transitions through one async mutex. The dedicated connection
//! guarantees that `BEGIN`/`COMMIT` pairs never interleave with statements
//! from other tasks; the mutex plus an optimistic version check guarantee
//! that of two racing confirmations for the same person or body, exactly
//! one wins and the loser observes [`ReviewError::ConcurrentModification`]
//! or an invalid transition.
//!
//! The effect of a confirmation is computed by
//! [`reunite_match_models::plan_confirmation`] and applied verbatim here:
//! the match flips to Confirmed, both linked records flip to Matched, and
//! every competing open match is retired — all inside one transaction, so
//! there is no observable intermediate state.

use chrono::{DateTime, Utc};
use reunite_match_models::{
    MatchRecord, MatchStatus, TransitionError, plan_confirmation, validate_transition,
};
use switchy_database::{Database, DatabaseValue};
use tokio::sync::Mutex;

use crate::{DbError, queries};

/// Errors surfaced by review actions.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// The referenced match, person, or UIDB record does not exist.
    #[error("{what} not found: {id}")]
    NotFound {
        /// Which kind of record was missing.
        what: &'static str,
        /// The ID that failed to resolve.
        id: String,
    },

    /// The action violates the review state machine.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The match (or a linked record) changed under the reviewer's feet;
    /// the whole transition was rolled back.
    #[error("Match {match_id} was modified concurrently")]
    ConcurrentModification {
        /// The contested match.
        match_id: String,
    },

    /// Underlying database failure.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Underlying database failure (raw driver error).
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),
}

/// Serialized applier of review transitions.
pub struct MatchReviewer {
    db: Box<dyn Database>,
    lock: Mutex<()>,
}

impl MatchReviewer {
    /// Creates a reviewer around a dedicated connection.
    ///
    /// The connection must not be shared with other query paths: the
    /// reviewer issues raw transaction control statements on it.
    #[must_use]
    pub fn new(db: Box<dyn Database>) -> Self {
        Self {
            db,
            lock: Mutex::new(()),
        }
    }

    /// Moves a Suggested match to UnderReview, recording who claimed it.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError`] if the match is unknown, the transition is
    /// invalid, or the row version moved concurrently.
    pub async fn begin_review(
        &self,
        match_id: &str,
        reviewer: &str,
    ) -> Result<MatchRecord, ReviewError> {
        let _guard = self.lock.lock().await;
        let db = self.db.as_ref();

        let target = fetch_match(db, match_id).await?;
        validate_transition(target.status, MatchStatus::UnderReview, reviewer)?;

        let affected = db
            .exec_raw_params(
                "UPDATE matches
                 SET status = $2, reviewed_by = $3, version = version + 1
                 WHERE id = $1 AND version = $4",
                &[
                    DatabaseValue::String(match_id.to_string()),
                    DatabaseValue::String(MatchStatus::UnderReview.to_string()),
                    DatabaseValue::String(reviewer.to_string()),
                    DatabaseValue::Int64(target.version),
                ],
            )
            .await?;

        if affected == 0 {
            return Err(ReviewError::ConcurrentModification {
                match_id: match_id.to_string(),
            });
        }

        log::info!("Match {match_id} moved under review by {reviewer}");
        fetch_match(db, match_id).await
    }

    /// Confirms a match: the match, both linked records, and every
    /// competing open candidate change together or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError`] if the match or a linked record is unknown,
    /// the state machine forbids the confirmation, or a concurrent
    /// transition won the race.
    pub async fn confirm(
        &self,
        match_id: &str,
        reviewer: &str,
    ) -> Result<MatchRecord, ReviewError> {
        let _guard = self.lock.lock().await;
        let db = self.db.as_ref();
        let now = Utc::now();

        let target = fetch_match(db, match_id).await?;

        let person = queries::get_missing_person(db, &target.missing_person_id)
            .await?
            .ok_or_else(|| ReviewError::NotFound {
                what: "Missing person",
                id: target.missing_person_id.clone(),
            })?;
        let uidb = queries::get_uidb_record(db, &target.uidb_id)
            .await?
            .ok_or_else(|| ReviewError::NotFound {
                what: "UIDB record",
                id: target.uidb_id.clone(),
            })?;

        let competing =
            queries::open_matches_for_entities(db, &target.missing_person_id, &target.uidb_id)
                .await?;

        let plan = plan_confirmation(&target, person.status, uidb.status, &competing, reviewer)?;

        db.exec_raw("BEGIN").await?;
        let applied = apply_confirmation(db, &target, &plan, reviewer, now).await;
        match applied {
            Ok(()) => {
                db.exec_raw("COMMIT").await?;
                log::info!(
                    "Match {match_id} confirmed by {reviewer}; retired {} competing candidate(s)",
                    plan.reject_match_ids.len()
                );
                fetch_match(db, match_id).await
            }
            Err(e) => {
                if let Err(rollback_err) = db.exec_raw("ROLLBACK").await {
                    log::error!("Rollback after failed confirmation also failed: {rollback_err}");
                }
                Err(e)
            }
        }
    }

    /// Rejects a match. Only the match row changes; linked records keep
    /// their statuses.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError`] if the match is unknown, already terminal,
    /// or the row version moved concurrently.
    pub async fn reject(
        &self,
        match_id: &str,
        reviewer: &str,
    ) -> Result<MatchRecord, ReviewError> {
        let _guard = self.lock.lock().await;
        let db = self.db.as_ref();
        let now = Utc::now();

        let target = fetch_match(db, match_id).await?;
        validate_transition(target.status, MatchStatus::Rejected, reviewer)?;

        let affected = db
            .exec_raw_params(
                "UPDATE matches
                 SET status = $2, reviewed_by = $3, reviewed_date = $4, version = version + 1
                 WHERE id = $1 AND version = $5",
                &[
                    DatabaseValue::String(match_id.to_string()),
                    DatabaseValue::String(MatchStatus::Rejected.to_string()),
                    DatabaseValue::String(reviewer.to_string()),
                    DatabaseValue::DateTime(now.naive_utc()),
                    DatabaseValue::Int64(target.version),
                ],
            )
            .await?;

        if affected == 0 {
            return Err(ReviewError::ConcurrentModification {
                match_id: match_id.to_string(),
            });
        }

        log::info!("Match {match_id} rejected by {reviewer}");
        fetch_match(db, match_id).await
    }
}

async fn fetch_match(db: &dyn Database, match_id: &str) -> Result<MatchRecord, ReviewError> {
    queries::get_match(db, match_id)
        .await?
        .ok_or_else(|| ReviewError::NotFound {
            what: "Match",
            id: match_id.to_string(),
        })
}

async fn apply_confirmation(
    db: &dyn Database,
    target: &MatchRecord,
    plan: &reunite_match_models::ConfirmationPlan,
    reviewer: &str,
    now: DateTime<Utc>,
) -> Result<(), ReviewError> {
    let affected = db
        .exec_raw_params(
            "UPDATE matches
             SET status = $2, reviewed_by = $3, reviewed_date = $4, version = version + 1
             WHERE id = $1 AND version = $5",
            &[
                DatabaseValue::String(plan.confirm_match_id.clone()),
                DatabaseValue::String(MatchStatus::Confirmed.to_string()),
                DatabaseValue::String(reviewer.to_string()),
                DatabaseValue::DateTime(now.naive_utc()),
                DatabaseValue::Int64(plan.expected_version),
            ],
        )
        .await?;

    if affected == 0 {
        return Err(ReviewError::ConcurrentModification {
            match_id: plan.confirm_match_id.clone(),
        });
    }

    // Competing candidates are retired with the confirming reviewer's
    // identity and timestamp as the audit trail of the retirement.
    for reject_id in &plan.reject_match_ids {
        db.exec_raw_params(
            "UPDATE matches
             SET status = $2, reviewed_by = $3, reviewed_date = $4, version = version + 1
             WHERE id = $1 AND status IN ('SUGGESTED', 'UNDER_REVIEW')",
            &[
                DatabaseValue::String(reject_id.clone()),
                DatabaseValue::String(MatchStatus::Rejected.to_string()),
                DatabaseValue::String(reviewer.to_string()),
                DatabaseValue::DateTime(now.naive_utc()),
            ],
        )
        .await?;
    }

    let person_flipped = queries::update_missing_person_status(
        db,
        &target.missing_person_id,
        reunite_case_models::MissingStatus::Active,
        reunite_case_models::MissingStatus::Matched,
    )
    .await?;
    if person_flipped == 0 {
        return Err(ReviewError::ConcurrentModification {
            match_id: plan.confirm_match_id.clone(),
        });
    }

    let uidb_flipped = queries::update_uidb_status(
        db,
        &target.uidb_id,
        reunite_case_models::UidbStatus::Unidentified,
        reunite_case_models::UidbStatus::Matched,
    )
    .await?;
    if uidb_flipped == 0 {
        return Err(ReviewError::ConcurrentModification {
            match_id: plan.confirm_match_id.clone(),
        });
    }

    Ok(())
}
