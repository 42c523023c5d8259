#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Case record types for the reunite portal.
//!
//! This crate defines the two independent case aggregates — missing-person
//! reports and unidentified-body (UIDB) records — together with their status
//! lifecycles and intake validation. Neither aggregate owns the other; they
//! are linked only through match records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Reported gender of a missing person.
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
pub enum Gender {
    /// Reported as male.
    Male,
    /// Reported as female.
    Female,
    /// Reported as other or undisclosed.
    Other,
}

/// Physical condition classification of an unidentified body, as recorded
/// by the forensic examiner at intake.
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
pub enum BodyCondition {
    /// Recently deceased, features intact.
    Fresh,
    /// Partial decomposition.
    Decomposed,
    /// Advanced decomposition, visual identification unreliable.
    SeverelyDecomposed,
    /// Skeletal remains only.
    Skeletal,
}

/// Lifecycle status of a missing-person report.
///
/// `Active` is the only non-terminal state: a report moves to `Matched` when
/// a match against a UIDB record is confirmed, or to `Closed` when the case
/// is resolved through other channels (person found alive, report withdrawn).
/// Records are soft-closed only; there is no resurrection from a terminal
/// state.
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
pub enum MissingStatus {
    /// Open report, eligible for matching.
    Active,
    /// Linked to a confirmed UIDB match.
    Matched,
    /// Resolved without a UIDB match.
    Closed,
}

impl MissingStatus {
    /// Returns whether this status accepts no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Matched | Self::Closed)
    }

    /// Returns whether a transition from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Matched | Self::Closed)
        )
    }
}

/// Lifecycle status of a UIDB record.
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
pub enum UidbStatus {
    /// No confirmed identity, eligible for matching.
    Unidentified,
    /// Linked to a confirmed missing-person match.
    Matched,
    /// Formally identified through forensic confirmation.
    Identified,
}

impl UidbStatus {
    /// Returns whether this record is still eligible for candidate matching.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Unidentified)
    }

    /// Returns whether a transition from `self` to `next` is allowed.
    ///
    /// A matched record may still move to `Identified` once the forensic
    /// confirmation paperwork completes; `Identified` is terminal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unidentified, Self::Matched | Self::Identified)
                | (Self::Matched, Self::Identified)
        )
    }
}

/// A WGS84 point with its human-readable address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
    /// Geocoded or reported address string.
    pub address: String,
}

impl GeoPoint {
    /// Creates a new point from the given coordinates and address.
    #[must_use]
    pub const fn new(lat: f64, lng: f64, address: String) -> Self {
        Self { lat, lng, address }
    }

    /// Returns whether the coordinates are within valid WGS84 bounds.
    #[must_use]
    pub fn in_bounds(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A photograph attached to a case record.
///
/// The image bytes themselves live in external object storage; the record
/// carries an opaque URI plus the face embedding computed at upload time.
/// Records without an embedding still participate in matching — the face
/// sub-score degrades to its floor instead of erroring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasePhoto {
    /// Opaque reference to the stored image.
    pub uri: String,
    /// Fixed-dimension face embedding, if the photo has been processed.
    pub embedding: Option<Vec<f32>>,
}

/// A missing-person report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingPerson {
    /// Record ID (`mp-…`).
    pub id: String,
    /// Full name as reported.
    pub name: String,
    /// Age in years at last sighting.
    pub age: u32,
    /// Reported gender.
    pub gender: Gender,
    /// Photographs supplied with the report.
    pub photos: Vec<CasePhoto>,
    /// Clothing description at last sighting.
    pub clothing: String,
    /// Free-text notes from the reporting officer.
    pub notes: String,
    /// Last known location.
    pub last_seen: GeoPoint,
    /// Date of last sighting.
    pub last_seen_date: DateTime<Utc>,
    /// First Information Report number.
    pub fir_number: String,
    /// Who filed the report (relationship or name).
    pub reported_by: String,
    /// When the report was filed.
    pub reported_date: DateTime<Utc>,
    /// Station that owns the case.
    pub station_id: String,
    /// Lifecycle status.
    pub status: MissingStatus,
}

/// An unidentified-body record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UidbRecord {
    /// Record ID (`uidb-…`).
    pub id: String,
    /// Human-readable case number (e.g. `UIDB/2024/001`).
    pub case_number: String,
    /// Forensic photographs.
    pub photos: Vec<CasePhoto>,
    /// Physical condition classification.
    pub condition: BodyCondition,
    /// Clothing found on the body.
    pub clothing: String,
    /// Injuries, marks, and other distinguishing features.
    pub injuries: String,
    /// Where the body was found.
    pub found: GeoPoint,
    /// When the body was found.
    pub found_date: DateTime<Utc>,
    /// Reference to the post-mortem report, once available.
    pub post_mortem_report: Option<String>,
    /// Station that owns the case.
    pub station_id: String,
    /// Lifecycle status.
    pub status: UidbStatus,
}

/// Filters for listing case records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseQuery {
    /// Status wire name to filter by (e.g. `ACTIVE`, `UNIDENTIFIED`).
    pub status: Option<String>,
    /// Owning station filter.
    pub station_id: Option<String>,
    /// Case-insensitive substring over name / FIR number / case number.
    pub search: Option<String>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Number of results to skip.
    pub offset: Option<u32>,
}

/// Upper bound accepted for `age` at intake. Ages above this are treated as
/// data-entry errors.
pub const MAX_PLAUSIBLE_AGE: u32 = 120;

/// Error returned when a case record fails intake validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseValidationError {
    /// Which field failed validation.
    pub field: &'static str,
    /// Description of the violation.
    pub message: String,
}

impl std::fmt::Display for CaseValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.field, self.message)
    }
}

impl std::error::Error for CaseValidationError {}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), CaseValidationError> {
    if value.trim().is_empty() {
        return Err(CaseValidationError {
            field,
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn require_in_bounds(field: &'static str, point: &GeoPoint) -> Result<(), CaseValidationError> {
    if !point.in_bounds() {
        return Err(CaseValidationError {
            field,
            message: format!("coordinates ({}, {}) out of range", point.lat, point.lng),
        });
    }
    Ok(())
}

impl MissingPerson {
    /// Validates the required identity and plausibility constraints for a
    /// missing-person report.
    ///
    /// # Errors
    ///
    /// Returns [`CaseValidationError`] naming the first violated field.
    pub fn validate(&self) -> Result<(), CaseValidationError> {
        require_non_empty("id", &self.id)?;
        require_non_empty("name", &self.name)?;
        require_non_empty("firNumber", &self.fir_number)?;
        require_non_empty("stationId", &self.station_id)?;
        require_in_bounds("lastSeen", &self.last_seen)?;

        if self.age > MAX_PLAUSIBLE_AGE {
            return Err(CaseValidationError {
                field: "age",
                message: format!("{} exceeds maximum {MAX_PLAUSIBLE_AGE}", self.age),
            });
        }

        if self.reported_date < self.last_seen_date {
            return Err(CaseValidationError {
                field: "reportedDate",
                message: "report precedes last sighting".to_string(),
            });
        }

        Ok(())
    }
}

impl UidbRecord {
    /// Validates the required identity constraints for a UIDB record.
    ///
    /// # Errors
    ///
    /// Returns [`CaseValidationError`] naming the first violated field.
    pub fn validate(&self) -> Result<(), CaseValidationError> {
        require_non_empty("id", &self.id)?;
        require_non_empty("caseNumber", &self.case_number)?;
        require_non_empty("stationId", &self.station_id)?;
        require_in_bounds("found", &self.found)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> MissingPerson {
        MissingPerson {
            id: "mp-001".to_string(),
            name: "Rahul Sharma".to_string(),
            age: 28,
            gender: Gender::Male,
            photos: Vec::new(),
            clothing: "Blue jeans, white t-shirt".to_string(),
            notes: "Last seen near Metro Station".to_string(),
            last_seen: GeoPoint::new(28.6139, 77.209, "Connaught Place, New Delhi".to_string()),
            last_seen_date: "2024-01-15T00:00:00Z".parse().unwrap(),
            fir_number: "FIR/2024/001".to_string(),
            reported_by: "Family Member".to_string(),
            reported_date: "2024-01-16T00:00:00Z".parse().unwrap(),
            station_id: "station-001".to_string(),
            status: MissingStatus::Active,
        }
    }

    #[test]
    fn missing_status_no_resurrection() {
        for terminal in [MissingStatus::Matched, MissingStatus::Closed] {
            assert!(terminal.is_terminal());
            for next in [
                MissingStatus::Active,
                MissingStatus::Matched,
                MissingStatus::Closed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(MissingStatus::Active.can_transition_to(MissingStatus::Matched));
        assert!(MissingStatus::Active.can_transition_to(MissingStatus::Closed));
        assert!(!MissingStatus::Active.can_transition_to(MissingStatus::Active));
    }

    #[test]
    fn uidb_status_transitions() {
        assert!(UidbStatus::Unidentified.can_transition_to(UidbStatus::Matched));
        assert!(UidbStatus::Unidentified.can_transition_to(UidbStatus::Identified));
        assert!(UidbStatus::Matched.can_transition_to(UidbStatus::Identified));
        assert!(!UidbStatus::Identified.can_transition_to(UidbStatus::Unidentified));
        assert!(!UidbStatus::Matched.can_transition_to(UidbStatus::Unidentified));
        assert!(UidbStatus::Unidentified.is_open());
        assert!(!UidbStatus::Matched.is_open());
    }

    #[test]
    fn validate_accepts_well_formed_report() {
        assert!(person().validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_identity_fields() {
        let mut p = person();
        p.name = "   ".to_string();
        let err = p.validate().unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn validate_rejects_implausible_age() {
        let mut p = person();
        p.age = 300;
        assert_eq!(p.validate().unwrap_err().field, "age");
    }

    #[test]
    fn validate_rejects_out_of_range_coordinates() {
        let mut p = person();
        p.last_seen.lat = 123.0;
        assert_eq!(p.validate().unwrap_err().field, "lastSeen");
    }

    #[test]
    fn validate_rejects_report_before_sighting() {
        let mut p = person();
        p.reported_date = "2024-01-10T00:00:00Z".parse().unwrap();
        assert_eq!(p.validate().unwrap_err().field, "reportedDate");
    }

    #[test]
    fn status_wire_format_is_screaming_snake() {
        assert_eq!(MissingStatus::Active.to_string(), "ACTIVE");
        assert_eq!(
            "SEVERELY_DECOMPOSED".parse::<BodyCondition>().unwrap(),
            BodyCondition::SeverelyDecomposed
        );
    }
}
