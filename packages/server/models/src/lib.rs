#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the reunite server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the row types so the API contract can evolve independently of the
//! storage layout.

use chrono::{DateTime, Utc};
use reunite_case_models::{BodyCondition, CasePhoto, Gender, GeoPoint};
use reunite_engine::{Confidence, MatchConfig};
use reunite_match_models::{MatchRecord, MatchStatus};
use serde::{Deserialize, Serialize};

/// `GET /api/health` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server considers itself healthy.
    pub healthy: bool,
    /// Crate version.
    pub version: String,
}

/// A photo supplied at intake.
///
/// The embedding is produced upstream by the photo pipeline (see
/// `reunite_engine::face::embed_photo`); records submitted without one
/// still match, with the face sub-score at its floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNewPhoto {
    /// Opaque reference to the stored image.
    pub uri: String,
    /// Face embedding computed at upload time.
    pub embedding: Option<Vec<f32>>,
}

impl From<ApiNewPhoto> for CasePhoto {
    fn from(photo: ApiNewPhoto) -> Self {
        Self {
            uri: photo.uri,
            embedding: photo.embedding,
        }
    }
}

/// `POST /api/missing-persons` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNewMissingPerson {
    /// Full name as reported.
    pub name: String,
    /// Age in years at last sighting.
    pub age: u32,
    /// Reported gender.
    pub gender: Gender,
    /// Photographs supplied with the report.
    #[serde(default)]
    pub photos: Vec<ApiNewPhoto>,
    /// Clothing description at last sighting.
    #[serde(default)]
    pub clothing: String,
    /// Free-text notes.
    #[serde(default)]
    pub notes: String,
    /// Last known location.
    pub last_seen: GeoPoint,
    /// Date of last sighting.
    pub last_seen_date: DateTime<Utc>,
    /// First Information Report number.
    pub fir_number: String,
    /// Who filed the report.
    pub reported_by: String,
    /// When the report was filed.
    pub reported_date: DateTime<Utc>,
    /// Station that owns the case.
    pub station_id: String,
}

/// `POST /api/uidb` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNewUidbRecord {
    /// Human-readable case number.
    pub case_number: String,
    /// Forensic photographs.
    #[serde(default)]
    pub photos: Vec<ApiNewPhoto>,
    /// Physical condition classification.
    pub condition: BodyCondition,
    /// Clothing found on the body.
    #[serde(default)]
    pub clothing: String,
    /// Injuries and distinguishing marks.
    #[serde(default)]
    pub injuries: String,
    /// Where the body was found.
    pub found: GeoPoint,
    /// When the body was found.
    pub found_date: DateTime<Utc>,
    /// Post-mortem report reference, if available.
    pub post_mortem_report: Option<String>,
    /// Station that owns the case.
    pub station_id: String,
}

/// A match as returned by the API: the stored record plus the display
/// confidence band and human-readable explanation labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMatch {
    /// Match ID.
    pub id: String,
    /// The missing-person side of the pairing.
    pub missing_person_id: String,
    /// The UIDB side of the pairing.
    pub uidb_id: String,
    /// Weighted aggregate score.
    pub overall_score: f64,
    /// Face sub-score.
    pub face_score: f64,
    /// Spatial/temporal sub-score.
    pub metadata_score: f64,
    /// Descriptive-text sub-score.
    pub text_score: f64,
    /// Review status.
    pub status: MatchStatus,
    /// Display confidence band for the aggregate.
    pub confidence: Confidence,
    /// Reviewer identity, once reviewed.
    pub reviewed_by: Option<String>,
    /// When the terminal review action happened.
    pub reviewed_date: Option<DateTime<Utc>>,
    /// Human-readable labels of the contributing dimensions.
    pub matched_attributes: Vec<String>,
    /// When the engine emitted this match.
    pub created_at: DateTime<Utc>,
}

impl From<MatchRecord> for ApiMatch {
    fn from(record: MatchRecord) -> Self {
        Self {
            id: record.id,
            missing_person_id: record.missing_person_id,
            uidb_id: record.uidb_id,
            overall_score: record.scores.overall,
            face_score: record.scores.face,
            metadata_score: record.scores.metadata,
            text_score: record.scores.text,
            status: record.status,
            confidence: MatchConfig::confidence(record.scores.overall),
            reviewed_by: record.reviewed_by,
            reviewed_date: record.reviewed_date,
            matched_attributes: record
                .matched_attributes
                .iter()
                .map(|a| a.label().to_string())
                .collect(),
            created_at: record.created_at,
        }
    }
}

/// `POST /api/matches/{id}/…` request body for review actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    /// Identity of the acting reviewer.
    pub reviewer: String,
}

/// Query parameters for case list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseQueryParams {
    /// Status wire name to filter by.
    pub status: Option<String>,
    /// Owning station filter.
    pub station_id: Option<String>,
    /// Case-insensitive substring over name / FIR / case number.
    pub q: Option<String>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

/// Query parameters for candidate-match list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchQueryParams {
    /// Only return matches at or above this aggregate score.
    pub min_score: Option<f64>,
    /// Only return matches in this status (wire name).
    pub status: Option<String>,
    /// Maximum number of results.
    pub limit: Option<u32>,
}

/// Query parameters for `GET /api/stats`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQueryParams {
    /// Trailing window (days) for the rolling average time-to-identify.
    pub window_days: Option<i64>,
}

/// Query parameters for `GET /api/analytics/monthly-trends`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendQueryParams {
    /// How many trailing months to include.
    pub months: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reunite_match_models::{MatchedAttribute, ScoreBreakdown};

    #[test]
    fn api_match_carries_confidence_and_labels() {
        let record = MatchRecord {
            id: "match-001".to_string(),
            missing_person_id: "mp-001".to_string(),
            uidb_id: "uidb-001".to_string(),
            scores: ScoreBreakdown {
                face: 0.92,
                metadata: 0.78,
                text: 0.75,
                overall: 0.844,
            },
            status: MatchStatus::Suggested,
            reviewed_by: None,
            reviewed_date: None,
            matched_attributes: vec![
                MatchedAttribute::FacialFeatures,
                MatchedAttribute::ClothingDescription,
            ],
            version: 1,
            created_at: "2024-02-01T00:00:00Z".parse().unwrap(),
        };

        let api: ApiMatch = record.into();
        assert_eq!(api.confidence, Confidence::High);
        assert_eq!(
            api.matched_attributes,
            vec!["Facial features".to_string(), "Clothing match".to_string()]
        );
    }
}
