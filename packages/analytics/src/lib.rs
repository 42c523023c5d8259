#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read-side reporting for the reunite dashboard.
//!
//! Every function recomputes from the source-of-truth tables on each call.
//! There is deliberately no cache layer here: the review lifecycle mutates
//! case and match rows, and a cached aggregate would drift from it.

use chrono::{Duration, Utc};
use moosicbox_json_utils::database::ToValue as _;
use reunite_analytics_models::{DashboardStats, MonthlyTrendPoint, ResolutionBucket};
use std::collections::BTreeMap;
use switchy_database::{Database, DatabaseValue};
use thiserror::Error;

/// Errors that can occur during reporting queries.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Trailing window for the rolling average time-to-identify.
pub const DEFAULT_STATS_WINDOW_DAYS: i64 = 90;

/// Histogram buckets: label and exclusive upper bound in days. The last
/// bucket is the catch-all.
pub const RESOLUTION_BUCKETS: &[(&str, f64)] = &[
    ("0-7 days", 7.0),
    ("7-14 days", 14.0),
    ("14-30 days", 30.0),
    ("30-60 days", 60.0),
    ("60+ days", f64::INFINITY),
];

async fn count(
    db: &dyn Database,
    sql: &str,
    params: &[DatabaseValue],
) -> Result<u64, AnalyticsError> {
    let rows = db.query_raw_params(sql, params).await?;
    let Some(row) = rows.first() else {
        return Ok(0);
    };
    let value: i64 = row.to_value("count").unwrap_or(0);
    Ok(u64::try_from(value).unwrap_or(0))
}

/// Computes the headline dashboard statistics.
///
/// `window_days` bounds the rolling average time-to-identify; pass
/// [`DEFAULT_STATS_WINDOW_DAYS`] unless the caller asked otherwise.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if any database query fails.
pub async fn dashboard_stats(
    db: &dyn Database,
    window_days: i64,
) -> Result<DashboardStats, AnalyticsError> {
    let active_missing = count(
        db,
        "SELECT COUNT(*) as count FROM missing_persons WHERE status = 'ACTIVE'",
        &[],
    )
    .await?;

    let uidb_records = count(db, "SELECT COUNT(*) as count FROM uidb_records", &[]).await?;

    let matches_suggested = count(
        db,
        "SELECT COUNT(*) as count FROM matches WHERE status IN ('SUGGESTED', 'UNDER_REVIEW')",
        &[],
    )
    .await?;

    let confirmed_matches = count(
        db,
        "SELECT COUNT(*) as count FROM matches WHERE status = 'CONFIRMED'",
        &[],
    )
    .await?;

    let cutoff = Utc::now() - Duration::days(window_days);
    let rows = db
        .query_raw_params(
            "SELECT (AVG(EXTRACT(EPOCH FROM (m.reviewed_date - p.reported_date)) / 86400.0))::float8
                    as avg_days
             FROM matches m
             JOIN missing_persons p ON m.missing_person_id = p.id
             WHERE m.status = 'CONFIRMED' AND m.reviewed_date >= $1",
            &[DatabaseValue::DateTime(cutoff.naive_utc())],
        )
        .await?;

    let avg_time_to_identify_days: Option<f64> = rows
        .first()
        .and_then(|row| row.to_value("avg_days").unwrap_or(None));

    Ok(DashboardStats {
        active_missing,
        uidb_records,
        matches_suggested,
        confirmed_matches,
        avg_time_to_identify_days,
    })
}

/// Buckets resolution times (in days) into [`RESOLUTION_BUCKETS`].
#[must_use]
pub fn bucket_resolution_days(days: &[f64]) -> Vec<ResolutionBucket> {
    let mut counts = vec![0u64; RESOLUTION_BUCKETS.len()];

    for &value in days {
        let idx = RESOLUTION_BUCKETS
            .iter()
            .position(|&(_, upper)| value < upper)
            .unwrap_or(RESOLUTION_BUCKETS.len() - 1);
        counts[idx] += 1;
    }

    RESOLUTION_BUCKETS
        .iter()
        .zip(counts)
        .map(|(&(range, _), bucket_count)| ResolutionBucket {
            range: range.to_string(),
            count: bucket_count,
        })
        .collect()
}

/// Computes the resolution-time histogram over all confirmed matches.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the database query fails.
pub async fn resolution_histogram(
    db: &dyn Database,
) -> Result<Vec<ResolutionBucket>, AnalyticsError> {
    let rows = db
        .query_raw_params(
            "SELECT (EXTRACT(EPOCH FROM (m.reviewed_date - p.reported_date)) / 86400.0)::float8 as days
             FROM matches m
             JOIN missing_persons p ON m.missing_person_id = p.id
             WHERE m.status = 'CONFIRMED' AND m.reviewed_date IS NOT NULL",
            &[],
        )
        .await?;

    let days: Vec<f64> = rows
        .iter()
        .filter_map(|row| row.to_value("days").ok())
        .collect();

    Ok(bucket_resolution_days(&days))
}

async fn monthly_counts(
    db: &dyn Database,
    sql: &str,
    cutoff: chrono::NaiveDateTime,
) -> Result<BTreeMap<String, u64>, AnalyticsError> {
    let rows = db
        .query_raw_params(sql, &[DatabaseValue::DateTime(cutoff)])
        .await?;

    let mut map = BTreeMap::new();
    for row in &rows {
        let month: String = row.to_value("month").unwrap_or_default();
        let month_count: i64 = row.to_value("count").unwrap_or(0);
        if !month.is_empty() {
            map.insert(month, u64::try_from(month_count).unwrap_or(0));
        }
    }
    Ok(map)
}

/// Computes per-month intake and confirmation counts over the trailing
/// `months` months.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if any database query fails.
pub async fn monthly_trends(
    db: &dyn Database,
    months: i64,
) -> Result<Vec<MonthlyTrendPoint>, AnalyticsError> {
    let cutoff = (Utc::now() - Duration::days(months * 30)).naive_utc();

    let missing = monthly_counts(
        db,
        "SELECT to_char(reported_date, 'YYYY-MM') as month, COUNT(*) as count
         FROM missing_persons WHERE reported_date >= $1
         GROUP BY month ORDER BY month",
        cutoff,
    )
    .await?;

    let uidb = monthly_counts(
        db,
        "SELECT to_char(found_date, 'YYYY-MM') as month, COUNT(*) as count
         FROM uidb_records WHERE found_date >= $1
         GROUP BY month ORDER BY month",
        cutoff,
    )
    .await?;

    let confirmed = monthly_counts(
        db,
        "SELECT to_char(reviewed_date, 'YYYY-MM') as month, COUNT(*) as count
         FROM matches WHERE status = 'CONFIRMED' AND reviewed_date >= $1
         GROUP BY month ORDER BY month",
        cutoff,
    )
    .await?;

    let mut month_keys: Vec<&String> = missing
        .keys()
        .chain(uidb.keys())
        .chain(confirmed.keys())
        .collect();
    month_keys.sort();
    month_keys.dedup();

    Ok(month_keys
        .into_iter()
        .map(|month| MonthlyTrendPoint {
            month: month.clone(),
            missing_reported: missing.get(month).copied().unwrap_or(0),
            uidb_intakes: uidb.get(month).copied().unwrap_or(0),
            matches_confirmed: confirmed.get(month).copied().unwrap_or(0),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_edges() {
        let days = [0.0, 6.9, 7.0, 13.9, 14.0, 29.9, 30.0, 59.9, 60.0, 400.0];
        let buckets = bucket_resolution_days(&days);

        let counts: Vec<u64> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 2, 2, 2, 2]);

        let labels: Vec<&str> = buckets.iter().map(|b| b.range.as_str()).collect();
        assert_eq!(
            labels,
            vec!["0-7 days", "7-14 days", "14-30 days", "30-60 days", "60+ days"]
        );
    }

    #[test]
    fn empty_input_yields_zeroed_buckets() {
        let buckets = bucket_resolution_days(&[]);
        assert_eq!(buckets.len(), RESOLUTION_BUCKETS.len());
        assert!(buckets.iter().all(|b| b.count == 0));
    }
}
