//! Query functions for the case store and match repository.
//!
//! All access goes through raw parameterized SQL against the
//! `switchy_database` connection. Matches are indexed by both
//! `missing_person_id` and `uidb_id` so the confirm-time competing-match
//! scan stays cheap.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use reunite_case_models::{
    CaseQuery, CasePhoto, GeoPoint, MissingPerson, MissingStatus, UidbRecord, UidbStatus,
};
use reunite_match_models::{MatchQuery, MatchRecord, MatchStatus, ScoreBreakdown};
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

fn utc(naive: chrono::NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)
}

fn opt_utc(naive: Option<chrono::NaiveDateTime>) -> Option<DateTime<Utc>> {
    naive.map(utc)
}

fn conversion<E: std::fmt::Display>(context: &str) -> impl Fn(E) -> DbError + '_ {
    move |e| DbError::Conversion {
        message: format!("{context}: {e}"),
    }
}

fn opt_string(value: Option<&String>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |s| DatabaseValue::String(s.clone()))
}

/// Serializes a photo embedding for storage, or SQL NULL when the photo has
/// not been processed.
fn embedding_value(embedding: Option<&Vec<f32>>) -> DatabaseValue {
    embedding.map_or(DatabaseValue::Null, |e| {
        DatabaseValue::String(serde_json::to_string(e).unwrap_or_else(|_| "[]".to_string()))
    })
}

async fn load_photos(
    db: &dyn Database,
    table: &str,
    fk_column: &str,
    owner_id: &str,
) -> Result<Vec<CasePhoto>, DbError> {
    let rows = db
        .query_raw_params(
            &format!("SELECT uri, embedding FROM {table} WHERE {fk_column} = $1 ORDER BY id"),
            &[DatabaseValue::String(owner_id.to_string())],
        )
        .await?;

    let mut photos = Vec::with_capacity(rows.len());
    for row in &rows {
        let uri: String = row.to_value("uri").unwrap_or_default();
        let raw_embedding: Option<String> = row.to_value("embedding").unwrap_or(None);
        let embedding = raw_embedding.and_then(|json| serde_json::from_str(&json).ok());
        photos.push(CasePhoto { uri, embedding });
    }
    Ok(photos)
}

async fn insert_photos(
    db: &dyn Database,
    table: &str,
    fk_column: &str,
    owner_id: &str,
    photos: &[CasePhoto],
) -> Result<(), DbError> {
    for photo in photos {
        db.exec_raw_params(
            &format!("INSERT INTO {table} ({fk_column}, uri, embedding) VALUES ($1, $2, $3)"),
            &[
                DatabaseValue::String(owner_id.to_string()),
                DatabaseValue::String(photo.uri.clone()),
                embedding_value(photo.embedding.as_ref()),
            ],
        )
        .await?;
    }
    Ok(())
}

/// Inserts a missing-person report and its photos.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub async fn insert_missing_person(
    db: &dyn Database,
    person: &MissingPerson,
) -> Result<(), DbError> {
    db.exec_raw_params(
        "INSERT INTO missing_persons (
            id, name, age, gender, clothing, notes,
            last_seen_lat, last_seen_lng, last_seen_address, last_seen_date,
            fir_number, reported_by, reported_date, station_id, status
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        &[
            DatabaseValue::String(person.id.clone()),
            DatabaseValue::String(person.name.clone()),
            DatabaseValue::Int32(i32::try_from(person.age).unwrap_or(i32::MAX)),
            DatabaseValue::String(person.gender.to_string()),
            DatabaseValue::String(person.clothing.clone()),
            DatabaseValue::String(person.notes.clone()),
            DatabaseValue::Real64(person.last_seen.lat),
            DatabaseValue::Real64(person.last_seen.lng),
            DatabaseValue::String(person.last_seen.address.clone()),
            DatabaseValue::DateTime(person.last_seen_date.naive_utc()),
            DatabaseValue::String(person.fir_number.clone()),
            DatabaseValue::String(person.reported_by.clone()),
            DatabaseValue::DateTime(person.reported_date.naive_utc()),
            DatabaseValue::String(person.station_id.clone()),
            DatabaseValue::String(person.status.to_string()),
        ],
    )
    .await?;

    insert_photos(db, "person_photos", "person_id", &person.id, &person.photos).await
}

fn decode_missing_person(
    row: &switchy_database::Row,
    photos: Vec<CasePhoto>,
) -> Result<MissingPerson, DbError> {
    let status_raw: String = row.to_value("status").unwrap_or_default();
    let status: MissingStatus = status_raw
        .parse()
        .map_err(conversion("Failed to parse missing person status"))?;

    let gender_raw: String = row.to_value("gender").unwrap_or_default();
    let gender = gender_raw
        .parse()
        .unwrap_or(reunite_case_models::Gender::Other);

    let last_seen_naive: chrono::NaiveDateTime = row.to_value("last_seen_date").unwrap_or_default();
    let reported_naive: chrono::NaiveDateTime = row.to_value("reported_date").unwrap_or_default();

    let age: i32 = row.to_value("age").unwrap_or(0);

    Ok(MissingPerson {
        id: row.to_value("id").unwrap_or_default(),
        name: row.to_value("name").unwrap_or_default(),
        age: u32::try_from(age).unwrap_or(0),
        gender,
        photos,
        clothing: row.to_value("clothing").unwrap_or_default(),
        notes: row.to_value("notes").unwrap_or_default(),
        last_seen: GeoPoint::new(
            row.to_value("last_seen_lat").unwrap_or(0.0),
            row.to_value("last_seen_lng").unwrap_or(0.0),
            row.to_value("last_seen_address").unwrap_or_default(),
        ),
        last_seen_date: utc(last_seen_naive),
        fir_number: row.to_value("fir_number").unwrap_or_default(),
        reported_by: row.to_value("reported_by").unwrap_or_default(),
        reported_date: utc(reported_naive),
        station_id: row.to_value("station_id").unwrap_or_default(),
        status,
    })
}

/// Fetches one missing-person report by ID, with photos.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_missing_person(
    db: &dyn Database,
    id: &str,
) -> Result<Option<MissingPerson>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT * FROM missing_persons WHERE id = $1",
            &[DatabaseValue::String(id.to_string())],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(None);
    };

    let photos = load_photos(db, "person_photos", "person_id", id).await?;
    decode_missing_person(row, photos).map(Some)
}

/// Lists missing-person reports with optional status, station, and text
/// filters, newest report first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_missing_persons(
    db: &dyn Database,
    query: &CaseQuery,
) -> Result<Vec<MissingPerson>, DbError> {
    let mut sql = String::from("SELECT * FROM missing_persons WHERE 1=1");
    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut param_idx = 1u32;

    if let Some(status) = &query.status {
        write!(sql, " AND status = ${param_idx}").unwrap();
        params.push(DatabaseValue::String(status.clone()));
        param_idx += 1;
    }

    if let Some(station_id) = &query.station_id {
        write!(sql, " AND station_id = ${param_idx}").unwrap();
        params.push(DatabaseValue::String(station_id.clone()));
        param_idx += 1;
    }

    if let Some(search) = &query.search {
        write!(
            sql,
            " AND (name ILIKE ${param_idx} OR fir_number ILIKE ${param_idx})"
        )
        .unwrap();
        params.push(DatabaseValue::String(format!("%{search}%")));
        param_idx += 1;
    }

    sql.push_str(" ORDER BY reported_date DESC");

    if let Some(limit) = query.limit {
        write!(sql, " LIMIT ${param_idx}").unwrap();
        params.push(DatabaseValue::Int64(i64::from(limit)));
        param_idx += 1;
    }

    if let Some(offset) = query.offset {
        write!(sql, " OFFSET ${param_idx}").unwrap();
        params.push(DatabaseValue::Int64(i64::from(offset)));
    }

    let rows = db.query_raw_params(&sql, &params).await?;

    let mut persons = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: String = row.to_value("id").unwrap_or_default();
        let photos = load_photos(db, "person_photos", "person_id", &id).await?;
        persons.push(decode_missing_person(row, photos)?);
    }
    Ok(persons)
}

/// Updates the lifecycle status of a missing-person report.
///
/// The `WHERE` clause re-checks the expected current status, so the update
/// applies zero rows if the record moved on concurrently.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_missing_person_status(
    db: &dyn Database,
    id: &str,
    from: MissingStatus,
    to: MissingStatus,
) -> Result<u64, DbError> {
    let affected = db
        .exec_raw_params(
            "UPDATE missing_persons SET status = $2 WHERE id = $1 AND status = $3",
            &[
                DatabaseValue::String(id.to_string()),
                DatabaseValue::String(to.to_string()),
                DatabaseValue::String(from.to_string()),
            ],
        )
        .await?;
    Ok(affected)
}

/// Inserts a UIDB record and its photos.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub async fn insert_uidb_record(db: &dyn Database, record: &UidbRecord) -> Result<(), DbError> {
    db.exec_raw_params(
        "INSERT INTO uidb_records (
            id, case_number, condition, clothing, injuries,
            found_lat, found_lng, found_address, found_date,
            post_mortem_report, station_id, status
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        &[
            DatabaseValue::String(record.id.clone()),
            DatabaseValue::String(record.case_number.clone()),
            DatabaseValue::String(record.condition.to_string()),
            DatabaseValue::String(record.clothing.clone()),
            DatabaseValue::String(record.injuries.clone()),
            DatabaseValue::Real64(record.found.lat),
            DatabaseValue::Real64(record.found.lng),
            DatabaseValue::String(record.found.address.clone()),
            DatabaseValue::DateTime(record.found_date.naive_utc()),
            opt_string(record.post_mortem_report.as_ref()),
            DatabaseValue::String(record.station_id.clone()),
            DatabaseValue::String(record.status.to_string()),
        ],
    )
    .await?;

    insert_photos(db, "uidb_photos", "uidb_id", &record.id, &record.photos).await
}

fn decode_uidb_record(
    row: &switchy_database::Row,
    photos: Vec<CasePhoto>,
) -> Result<UidbRecord, DbError> {
    let status_raw: String = row.to_value("status").unwrap_or_default();
    let status: UidbStatus = status_raw
        .parse()
        .map_err(conversion("Failed to parse UIDB status"))?;

    let condition_raw: String = row.to_value("condition").unwrap_or_default();
    let condition = condition_raw
        .parse()
        .map_err(conversion("Failed to parse UIDB condition"))?;

    let found_naive: chrono::NaiveDateTime = row.to_value("found_date").unwrap_or_default();

    Ok(UidbRecord {
        id: row.to_value("id").unwrap_or_default(),
        case_number: row.to_value("case_number").unwrap_or_default(),
        photos,
        condition,
        clothing: row.to_value("clothing").unwrap_or_default(),
        injuries: row.to_value("injuries").unwrap_or_default(),
        found: GeoPoint::new(
            row.to_value("found_lat").unwrap_or(0.0),
            row.to_value("found_lng").unwrap_or(0.0),
            row.to_value("found_address").unwrap_or_default(),
        ),
        found_date: utc(found_naive),
        post_mortem_report: row.to_value("post_mortem_report").unwrap_or(None),
        station_id: row.to_value("station_id").unwrap_or_default(),
        status,
    })
}

/// Fetches one UIDB record by ID, with photos.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_uidb_record(db: &dyn Database, id: &str) -> Result<Option<UidbRecord>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT * FROM uidb_records WHERE id = $1",
            &[DatabaseValue::String(id.to_string())],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(None);
    };

    let photos = load_photos(db, "uidb_photos", "uidb_id", id).await?;
    decode_uidb_record(row, photos).map(Some)
}

/// Lists UIDB records with optional status, station, and text filters,
/// newest find first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_uidb_records(
    db: &dyn Database,
    query: &CaseQuery,
) -> Result<Vec<UidbRecord>, DbError> {
    let mut sql = String::from("SELECT * FROM uidb_records WHERE 1=1");
    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut param_idx = 1u32;

    if let Some(status) = &query.status {
        write!(sql, " AND status = ${param_idx}").unwrap();
        params.push(DatabaseValue::String(status.clone()));
        param_idx += 1;
    }

    if let Some(station_id) = &query.station_id {
        write!(sql, " AND station_id = ${param_idx}").unwrap();
        params.push(DatabaseValue::String(station_id.clone()));
        param_idx += 1;
    }

    if let Some(search) = &query.search {
        write!(sql, " AND case_number ILIKE ${param_idx}").unwrap();
        params.push(DatabaseValue::String(format!("%{search}%")));
        param_idx += 1;
    }

    sql.push_str(" ORDER BY found_date DESC");

    if let Some(limit) = query.limit {
        write!(sql, " LIMIT ${param_idx}").unwrap();
        params.push(DatabaseValue::Int64(i64::from(limit)));
        param_idx += 1;
    }

    if let Some(offset) = query.offset {
        write!(sql, " OFFSET ${param_idx}").unwrap();
        params.push(DatabaseValue::Int64(i64::from(offset)));
    }

    let rows = db.query_raw_params(&sql, &params).await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: String = row.to_value("id").unwrap_or_default();
        let photos = load_photos(db, "uidb_photos", "uidb_id", &id).await?;
        records.push(decode_uidb_record(row, photos)?);
    }
    Ok(records)
}

/// Updates the lifecycle status of a UIDB record, re-checking the expected
/// current status.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_uidb_status(
    db: &dyn Database,
    id: &str,
    from: UidbStatus,
    to: UidbStatus,
) -> Result<u64, DbError> {
    let affected = db
        .exec_raw_params(
            "UPDATE uidb_records SET status = $2 WHERE id = $1 AND status = $3",
            &[
                DatabaseValue::String(id.to_string()),
                DatabaseValue::String(to.to_string()),
                DatabaseValue::String(from.to_string()),
            ],
        )
        .await?;
    Ok(affected)
}

/// Inserts a match record.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn insert_match(db: &dyn Database, record: &MatchRecord) -> Result<(), DbError> {
    let attributes = serde_json::to_string(&record.matched_attributes).map_err(|e| {
        DbError::Conversion {
            message: format!("Failed to serialize matched attributes: {e}"),
        }
    })?;

    db.exec_raw_params(
        "INSERT INTO matches (
            id, missing_person_id, uidb_id,
            face_score, metadata_score, text_score, overall_score,
            status, matched_attributes, reviewed_by, reviewed_date,
            version, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        &[
            DatabaseValue::String(record.id.clone()),
            DatabaseValue::String(record.missing_person_id.clone()),
            DatabaseValue::String(record.uidb_id.clone()),
            DatabaseValue::Real64(record.scores.face),
            DatabaseValue::Real64(record.scores.metadata),
            DatabaseValue::Real64(record.scores.text),
            DatabaseValue::Real64(record.scores.overall),
            DatabaseValue::String(record.status.to_string()),
            DatabaseValue::String(attributes),
            opt_string(record.reviewed_by.as_ref()),
            record
                .reviewed_date
                .map_or(DatabaseValue::Null, |dt| {
                    DatabaseValue::DateTime(dt.naive_utc())
                }),
            DatabaseValue::Int64(record.version),
            DatabaseValue::DateTime(record.created_at.naive_utc()),
        ],
    )
    .await?;

    Ok(())
}

fn decode_match(row: &switchy_database::Row) -> Result<MatchRecord, DbError> {
    let status_raw: String = row.to_value("status").unwrap_or_default();
    let status: MatchStatus = status_raw
        .parse()
        .map_err(conversion("Failed to parse match status"))?;

    let attributes_raw: String = row.to_value("matched_attributes").unwrap_or_default();
    let matched_attributes = serde_json::from_str(&attributes_raw).unwrap_or_default();

    let created_naive: chrono::NaiveDateTime = row.to_value("created_at").unwrap_or_default();
    let reviewed_naive: Option<chrono::NaiveDateTime> =
        row.to_value("reviewed_date").unwrap_or(None);

    Ok(MatchRecord {
        id: row.to_value("id").unwrap_or_default(),
        missing_person_id: row.to_value("missing_person_id").unwrap_or_default(),
        uidb_id: row.to_value("uidb_id").unwrap_or_default(),
        scores: ScoreBreakdown {
            face: row.to_value("face_score").unwrap_or(0.0),
            metadata: row.to_value("metadata_score").unwrap_or(0.0),
            text: row.to_value("text_score").unwrap_or(0.0),
            overall: row.to_value("overall_score").unwrap_or(0.0),
        },
        status,
        reviewed_by: row.to_value("reviewed_by").unwrap_or(None),
        reviewed_date: opt_utc(reviewed_naive),
        matched_attributes,
        version: row.to_value("version").unwrap_or(1),
        created_at: utc(created_naive),
    })
}

/// Fetches one match by ID.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_match(db: &dyn Database, id: &str) -> Result<Option<MatchRecord>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT * FROM matches WHERE id = $1",
            &[DatabaseValue::String(id.to_string())],
        )
        .await?;

    rows.first().map(decode_match).transpose()
}

async fn matches_for_entity(
    db: &dyn Database,
    column: &str,
    entity_id: &str,
    query: &MatchQuery,
) -> Result<Vec<MatchRecord>, DbError> {
    let mut sql = format!("SELECT * FROM matches WHERE {column} = $1");
    let mut params: Vec<DatabaseValue> = vec![DatabaseValue::String(entity_id.to_string())];
    let mut param_idx = 2u32;

    if let Some(min_score) = query.min_score {
        write!(sql, " AND overall_score >= ${param_idx}").unwrap();
        params.push(DatabaseValue::Real64(min_score));
        param_idx += 1;
    }

    if let Some(status) = query.status {
        write!(sql, " AND status = ${param_idx}").unwrap();
        params.push(DatabaseValue::String(status.to_string()));
        param_idx += 1;
    }

    // Highest score first; ties go to the earlier suggestion.
    sql.push_str(" ORDER BY overall_score DESC, created_at ASC");

    write!(sql, " LIMIT ${param_idx}").unwrap();
    params.push(DatabaseValue::Int64(i64::from(query.limit.unwrap_or(100))));

    let rows = db.query_raw_params(&sql, &params).await?;
    rows.iter().map(decode_match).collect()
}

/// Lists candidate matches for a missing person, ordered by score
/// descending with ties broken by earlier creation time.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn matches_for_person(
    db: &dyn Database,
    person_id: &str,
    query: &MatchQuery,
) -> Result<Vec<MatchRecord>, DbError> {
    matches_for_entity(db, "missing_person_id", person_id, query).await
}

/// Lists candidate matches for a UIDB record, ordered by score descending
/// with ties broken by earlier creation time.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn matches_for_uidb(
    db: &dyn Database,
    uidb_id: &str,
    query: &MatchQuery,
) -> Result<Vec<MatchRecord>, DbError> {
    matches_for_entity(db, "uidb_id", uidb_id, query).await
}

/// Fetches every non-terminal match referencing the given person or UIDB
/// record — the competing-candidate scan used by confirmation.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn open_matches_for_entities(
    db: &dyn Database,
    person_id: &str,
    uidb_id: &str,
) -> Result<Vec<MatchRecord>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT * FROM matches
             WHERE (missing_person_id = $1 OR uidb_id = $2)
               AND status IN ('SUGGESTED', 'UNDER_REVIEW')",
            &[
                DatabaseValue::String(person_id.to_string()),
                DatabaseValue::String(uidb_id.to_string()),
            ],
        )
        .await?;

    rows.iter().map(decode_match).collect()
}

/// Fetches every match on file, for batch re-match reconciliation.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn all_matches(db: &dyn Database) -> Result<Vec<MatchRecord>, DbError> {
    let rows = db.query_raw_params("SELECT * FROM matches", &[]).await?;
    rows.iter().map(decode_match).collect()
}
