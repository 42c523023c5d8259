//! HTTP handler functions for the reunite API.

use std::sync::atomic::AtomicBool;

use actix_web::{HttpResponse, web};
use reunite_case_models::{CaseQuery, MissingPerson, MissingStatus, UidbRecord, UidbStatus};
use reunite_database::review::ReviewError;
use reunite_database::{queries, rematch};
use reunite_engine::batch::plan_rematch;
use reunite_match_models::{MatchQuery, MatchStatus, TransitionError};
use reunite_server_models::{
    ApiHealth, ApiMatch, ApiNewMissingPerson, ApiNewUidbRecord, CaseQueryParams, MatchQueryParams,
    ReviewRequest, StatsQueryParams, TrendQueryParams,
};
use uuid::Uuid;

use crate::AppState;

/// Default page size for list endpoints.
const DEFAULT_PAGE_SIZE: u32 = 100;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn error_json(message: &str) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

fn internal_error(context: &str, e: &dyn std::fmt::Display) -> HttpResponse {
    log::error!("{context}: {e}");
    HttpResponse::InternalServerError().json(error_json(context))
}

fn review_error_response(e: &ReviewError) -> HttpResponse {
    match e {
        ReviewError::NotFound { .. } => HttpResponse::NotFound().json(error_json(&e.to_string())),
        ReviewError::Transition(TransitionError::MissingReviewer) => {
            HttpResponse::BadRequest().json(error_json(&e.to_string()))
        }
        ReviewError::Transition(_) | ReviewError::ConcurrentModification { .. } => {
            HttpResponse::Conflict().json(error_json(&e.to_string()))
        }
        ReviewError::Db(_) | ReviewError::Database(_) => {
            internal_error("Review action failed", e)
        }
    }
}

fn case_query(params: &CaseQueryParams) -> CaseQuery {
    CaseQuery {
        status: params.status.clone(),
        station_id: params.station_id.clone(),
        search: params.q.clone(),
        limit: Some(params.limit.unwrap_or(DEFAULT_PAGE_SIZE)),
        offset: params.offset,
    }
}

fn match_query(params: &MatchQueryParams) -> Result<MatchQuery, HttpResponse> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<MatchStatus>)
        .transpose()
        .map_err(|_| {
            HttpResponse::BadRequest().json(error_json("Unknown match status filter"))
        })?;

    Ok(MatchQuery {
        min_score: params.min_score,
        status,
        limit: Some(params.limit.unwrap_or(DEFAULT_PAGE_SIZE)),
    })
}

/// Scores a freshly ingested record against every open counterpart and
/// inserts the candidates that clear the threshold.
async fn suggest_candidates(
    state: &AppState,
    persons: &[MissingPerson],
    uidbs: &[UidbRecord],
) -> Result<u64, HttpResponse> {
    let plan = plan_rematch(&state.config, persons, uidbs, &[], &AtomicBool::new(false));

    for failure in &plan.failures {
        log::warn!(
            "Scoring failed for pair ({}, {}): {}",
            failure.missing_person_id,
            failure.uidb_id,
            failure.message
        );
    }

    match rematch::apply_rematch_plan(state.db.as_ref(), &state.reviewer, &plan).await {
        Ok(summary) => Ok(summary.inserted),
        Err(e) => Err(internal_error("Failed to store suggested matches", &e)),
    }
}

/// `POST /api/missing-persons`
///
/// Validated intake. On success the new report is scored against every
/// open UIDB record and any clearing candidates are stored as Suggested.
pub async fn create_missing_person(
    state: web::Data<AppState>,
    body: web::Json<ApiNewMissingPerson>,
) -> HttpResponse {
    let body = body.into_inner();

    let person = MissingPerson {
        id: format!("mp-{}", Uuid::new_v4()),
        name: body.name,
        age: body.age,
        gender: body.gender,
        photos: body.photos.into_iter().map(Into::into).collect(),
        clothing: body.clothing,
        notes: body.notes,
        last_seen: body.last_seen,
        last_seen_date: body.last_seen_date,
        fir_number: body.fir_number,
        reported_by: body.reported_by,
        reported_date: body.reported_date,
        station_id: body.station_id,
        status: MissingStatus::Active,
    };

    if let Err(e) = person.validate() {
        return HttpResponse::BadRequest().json(error_json(&e.to_string()));
    }

    if let Err(e) = queries::insert_missing_person(state.db.as_ref(), &person).await {
        return internal_error("Failed to store missing person report", &e);
    }

    let open_uidbs = match queries::list_uidb_records(
        state.db.as_ref(),
        &CaseQuery {
            status: Some(UidbStatus::Unidentified.to_string()),
            ..CaseQuery::default()
        },
    )
    .await
    {
        Ok(records) => records,
        Err(e) => return internal_error("Failed to load UIDB records for scoring", &e),
    };

    match suggest_candidates(&state, std::slice::from_ref(&person), &open_uidbs).await {
        Ok(suggested) => HttpResponse::Created().json(serde_json::json!({
            "record": person,
            "matchesSuggested": suggested,
        })),
        Err(response) => response,
    }
}

/// `GET /api/missing-persons`
pub async fn list_missing_persons(
    state: web::Data<AppState>,
    params: web::Query<CaseQueryParams>,
) -> HttpResponse {
    match queries::list_missing_persons(state.db.as_ref(), &case_query(&params)).await {
        Ok(persons) => HttpResponse::Ok().json(persons),
        Err(e) => internal_error("Failed to list missing persons", &e),
    }
}

/// `GET /api/missing-persons/{id}`
pub async fn get_missing_person(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    match queries::get_missing_person(state.db.as_ref(), &id).await {
        Ok(Some(person)) => HttpResponse::Ok().json(person),
        Ok(None) => HttpResponse::NotFound().json(error_json("Missing person not found")),
        Err(e) => internal_error("Failed to fetch missing person", &e),
    }
}

/// `GET /api/missing-persons/{id}/matches`
///
/// Candidate matches ordered by score descending, ties broken by earlier
/// creation time.
pub async fn person_matches(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<MatchQueryParams>,
) -> HttpResponse {
    let id = path.into_inner();
    let query = match match_query(&params) {
        Ok(query) => query,
        Err(response) => return response,
    };

    match queries::matches_for_person(state.db.as_ref(), &id, &query).await {
        Ok(matches) => {
            let api: Vec<ApiMatch> = matches.into_iter().map(ApiMatch::from).collect();
            HttpResponse::Ok().json(api)
        }
        Err(e) => internal_error("Failed to list matches", &e),
    }
}

/// `POST /api/missing-persons/{id}/close`
///
/// Soft-closes an Active report (person found alive, report withdrawn).
/// Closed is terminal; the record stays on file for audit.
pub async fn close_missing_person(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();

    let person = match queries::get_missing_person(state.db.as_ref(), &id).await {
        Ok(Some(person)) => person,
        Ok(None) => return HttpResponse::NotFound().json(error_json("Missing person not found")),
        Err(e) => return internal_error("Failed to fetch missing person", &e),
    };

    if !person.status.can_transition_to(MissingStatus::Closed) {
        return HttpResponse::Conflict().json(error_json(&format!(
            "Cannot close a report in status {}",
            person.status
        )));
    }

    match queries::update_missing_person_status(
        state.db.as_ref(),
        &id,
        person.status,
        MissingStatus::Closed,
    )
    .await
    {
        Ok(0) => HttpResponse::Conflict().json(error_json("Report changed concurrently")),
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({ "id": id, "status": "CLOSED" })),
        Err(e) => internal_error("Failed to close report", &e),
    }
}

/// `POST /api/uidb`
///
/// Validated intake. On success the new record is scored against every
/// active missing-person report.
pub async fn create_uidb_record(
    state: web::Data<AppState>,
    body: web::Json<ApiNewUidbRecord>,
) -> HttpResponse {
    let body = body.into_inner();

    let record = UidbRecord {
        id: format!("uidb-{}", Uuid::new_v4()),
        case_number: body.case_number,
        photos: body.photos.into_iter().map(Into::into).collect(),
        condition: body.condition,
        clothing: body.clothing,
        injuries: body.injuries,
        found: body.found,
        found_date: body.found_date,
        post_mortem_report: body.post_mortem_report,
        station_id: body.station_id,
        status: UidbStatus::Unidentified,
    };

    if let Err(e) = record.validate() {
        return HttpResponse::BadRequest().json(error_json(&e.to_string()));
    }

    if let Err(e) = queries::insert_uidb_record(state.db.as_ref(), &record).await {
        return internal_error("Failed to store UIDB record", &e);
    }

    let active_persons = match queries::list_missing_persons(
        state.db.as_ref(),
        &CaseQuery {
            status: Some(MissingStatus::Active.to_string()),
            ..CaseQuery::default()
        },
    )
    .await
    {
        Ok(persons) => persons,
        Err(e) => return internal_error("Failed to load reports for scoring", &e),
    };

    match suggest_candidates(&state, &active_persons, std::slice::from_ref(&record)).await {
        Ok(suggested) => HttpResponse::Created().json(serde_json::json!({
            "record": record,
            "matchesSuggested": suggested,
        })),
        Err(response) => response,
    }
}

/// `GET /api/uidb`
pub async fn list_uidb_records(
    state: web::Data<AppState>,
    params: web::Query<CaseQueryParams>,
) -> HttpResponse {
    match queries::list_uidb_records(state.db.as_ref(), &case_query(&params)).await {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(e) => internal_error("Failed to list UIDB records", &e),
    }
}

/// `GET /api/uidb/{id}`
pub async fn get_uidb_record(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();
    match queries::get_uidb_record(state.db.as_ref(), &id).await {
        Ok(Some(record)) => HttpResponse::Ok().json(record),
        Ok(None) => HttpResponse::NotFound().json(error_json("UIDB record not found")),
        Err(e) => internal_error("Failed to fetch UIDB record", &e),
    }
}

/// `GET /api/uidb/{id}/matches`
pub async fn uidb_matches(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<MatchQueryParams>,
) -> HttpResponse {
    let id = path.into_inner();
    let query = match match_query(&params) {
        Ok(query) => query,
        Err(response) => return response,
    };

    match queries::matches_for_uidb(state.db.as_ref(), &id, &query).await {
        Ok(matches) => {
            let api: Vec<ApiMatch> = matches.into_iter().map(ApiMatch::from).collect();
            HttpResponse::Ok().json(api)
        }
        Err(e) => internal_error("Failed to list matches", &e),
    }
}

/// `POST /api/uidb/{id}/identify`
///
/// Marks a record as formally identified once the forensic confirmation
/// paperwork completes.
pub async fn identify_uidb_record(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();

    let record = match queries::get_uidb_record(state.db.as_ref(), &id).await {
        Ok(Some(record)) => record,
        Ok(None) => return HttpResponse::NotFound().json(error_json("UIDB record not found")),
        Err(e) => return internal_error("Failed to fetch UIDB record", &e),
    };

    if !record.status.can_transition_to(UidbStatus::Identified) {
        return HttpResponse::Conflict().json(error_json(&format!(
            "Cannot identify a record in status {}",
            record.status
        )));
    }

    match queries::update_uidb_status(
        state.db.as_ref(),
        &id,
        record.status,
        UidbStatus::Identified,
    )
    .await
    {
        Ok(0) => HttpResponse::Conflict().json(error_json("Record changed concurrently")),
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({ "id": id, "status": "IDENTIFIED" })),
        Err(e) => internal_error("Failed to identify record", &e),
    }
}

/// `POST /api/matches/{id}/review`
///
/// Moves a Suggested match to UnderReview under the given reviewer.
pub async fn begin_review(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ReviewRequest>,
) -> HttpResponse {
    let id = path.into_inner();
    match state.reviewer.begin_review(&id, &body.reviewer).await {
        Ok(record) => HttpResponse::Ok().json(ApiMatch::from(record)),
        Err(e) => review_error_response(&e),
    }
}

/// `POST /api/matches/{id}/confirm`
///
/// Confirms a match: the match, both linked case records, and every
/// competing open candidate change atomically.
pub async fn confirm_match(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ReviewRequest>,
) -> HttpResponse {
    let id = path.into_inner();
    match state.reviewer.confirm(&id, &body.reviewer).await {
        Ok(record) => HttpResponse::Ok().json(ApiMatch::from(record)),
        Err(e) => review_error_response(&e),
    }
}

/// `POST /api/matches/{id}/reject`
pub async fn reject_match(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ReviewRequest>,
) -> HttpResponse {
    let id = path.into_inner();
    match state.reviewer.reject(&id, &body.reviewer).await {
        Ok(record) => HttpResponse::Ok().json(ApiMatch::from(record)),
        Err(e) => review_error_response(&e),
    }
}

/// `GET /api/stats`
pub async fn stats(
    state: web::Data<AppState>,
    params: web::Query<StatsQueryParams>,
) -> HttpResponse {
    let window = params
        .window_days
        .unwrap_or(reunite_analytics::DEFAULT_STATS_WINDOW_DAYS);

    match reunite_analytics::dashboard_stats(state.db.as_ref(), window).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => internal_error("Failed to compute dashboard stats", &e),
    }
}

/// `GET /api/analytics/resolution-times`
pub async fn resolution_times(state: web::Data<AppState>) -> HttpResponse {
    match reunite_analytics::resolution_histogram(state.db.as_ref()).await {
        Ok(buckets) => HttpResponse::Ok().json(buckets),
        Err(e) => internal_error("Failed to compute resolution histogram", &e),
    }
}

/// `GET /api/analytics/monthly-trends`
pub async fn monthly_trends(
    state: web::Data<AppState>,
    params: web::Query<TrendQueryParams>,
) -> HttpResponse {
    let months = params.months.unwrap_or(6).max(1);

    match reunite_analytics::monthly_trends(state.db.as_ref(), months).await {
        Ok(points) => HttpResponse::Ok().json(points),
        Err(e) => internal_error("Failed to compute monthly trends", &e),
    }
}
