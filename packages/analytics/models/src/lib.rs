#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Reporting result types.
//!
//! All reporting is read-side: these shapes are recomputed from the
//! source-of-truth tables on every query, never cached, so they cannot
//! drift from the review lifecycle.

use serde::{Deserialize, Serialize};

/// Headline dashboard statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Missing-person reports currently Active.
    pub active_missing: u64,
    /// UIDB records on file.
    pub uidb_records: u64,
    /// Matches awaiting a review outcome (Suggested or UnderReview).
    pub matches_suggested: u64,
    /// Matches confirmed to date.
    pub confirmed_matches: u64,
    /// Rolling average days from report to confirmation, over the trailing
    /// window; `None` when no match was confirmed in the window.
    pub avg_time_to_identify_days: Option<f64>,
}

/// One bar of the resolution-time histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionBucket {
    /// Human-readable range label (e.g. `7-14 days`).
    pub range: String,
    /// Confirmed matches whose resolution time fell in this range.
    pub count: u64,
}

/// One month of intake and confirmation counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrendPoint {
    /// Month key in `YYYY-MM` form.
    pub month: String,
    /// Missing-person reports filed that month.
    pub missing_reported: u64,
    /// UIDB records taken in that month.
    pub uidb_intakes: u64,
    /// Matches confirmed that month.
    pub matches_confirmed: u64,
}
