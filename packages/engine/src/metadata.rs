//! Spatial/temporal sub-score.
//!
//! Combines great-circle distance between the last-seen and found locations
//! with the elapsed time between the last sighting and the find. Both
//! factors decay exponentially, so the score is monotone non-increasing in
//! distance and in elapsed time beyond the plausible window. All scales come
//! from [`MatchConfig`], never per-call literals.

use chrono::{DateTime, Utc};
use reunite_case_models::GeoPoint;

use crate::config::MatchConfig;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Great-circle distance between two points, in kilometers, via the
/// haversine formula.
#[must_use]
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Spatial/temporal proximity score in [0, 1].
///
/// A find that precedes the last sighting is physically implausible and
/// scores 0.0 outright. Otherwise the score is the product of an
/// exponential distance decay and a time factor that stays at 1.0 inside
/// the plausible window and decays exponentially beyond it.
#[must_use]
pub fn metadata_score(
    config: &MatchConfig,
    last_seen: &GeoPoint,
    last_seen_date: DateTime<Utc>,
    found: &GeoPoint,
    found_date: DateTime<Utc>,
) -> f64 {
    let elapsed_seconds = (found_date - last_seen_date).num_seconds();
    if elapsed_seconds < 0 {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let elapsed_days = elapsed_seconds as f64 / SECONDS_PER_DAY;

    let distance_km = haversine_km(last_seen, found);
    let distance_factor = (-distance_km / config.distance_decay_km).exp();

    let overdue_days = (elapsed_days - config.plausible_window_days).max(0.0);
    let time_factor = (-overdue_days / config.time_decay_days).exp();

    (distance_factor * time_factor).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng, String::new())
    }

    fn date(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn haversine_known_distance() {
        // Connaught Place, Delhi to Noida Sector 62: roughly 20 km.
        let delhi = point(28.6139, 77.209);
        let noida = point(28.5355, 77.391);
        let d = haversine_km(&delhi, &noida);
        assert!((15.0..25.0).contains(&d), "unexpected distance {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let p = point(19.076, 72.8777);
        assert!(haversine_km(&p, &p) < 1e-9);
    }

    #[test]
    fn monotone_non_increasing_in_distance() {
        let config = MatchConfig::default();
        let last_seen = point(28.6139, 77.209);
        let when = date("2024-01-15T00:00:00Z");
        let found_date = date("2024-01-20T00:00:00Z");

        let mut previous = f64::INFINITY;
        for step in 0..10 {
            let found = point(28.6139, 77.209 + f64::from(step) * 0.5);
            let score = metadata_score(&config, &last_seen, when, &found, found_date);
            assert!(score <= previous, "score increased with distance");
            previous = score;
        }
    }

    #[test]
    fn monotone_non_increasing_in_elapsed_time() {
        let config = MatchConfig::default();
        let last_seen = point(28.6139, 77.209);
        let found = point(28.5355, 77.391);
        let when = date("2024-01-15T00:00:00Z");

        let mut previous = f64::INFINITY;
        for days in [1, 10, 30, 45, 90, 365] {
            let found_date = when + chrono::Duration::days(days);
            let score = metadata_score(&config, &last_seen, when, &found, found_date);
            assert!(score <= previous, "score increased with elapsed time");
            previous = score;
        }
    }

    #[test]
    fn no_penalty_inside_plausible_window() {
        let config = MatchConfig::default();
        let last_seen = point(28.6139, 77.209);
        let found = point(28.5355, 77.391);
        let when = date("2024-01-15T00:00:00Z");

        let early = metadata_score(
            &config,
            &last_seen,
            when,
            &found,
            when + chrono::Duration::days(2),
        );
        let late = metadata_score(
            &config,
            &last_seen,
            when,
            &found,
            when + chrono::Duration::days(20),
        );
        assert!((early - late).abs() < 1e-12);
    }

    #[test]
    fn find_before_sighting_scores_zero() {
        let config = MatchConfig::default();
        let p = point(28.6139, 77.209);
        let score = metadata_score(
            &config,
            &p,
            date("2024-01-15T00:00:00Z"),
            &p,
            date("2024-01-10T00:00:00Z"),
        );
        assert!((score - 0.0).abs() < f64::EPSILON);
    }
}
