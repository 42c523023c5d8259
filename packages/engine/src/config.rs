//! Scoring policy configuration.
//!
//! Every tunable the engine consults lives here as a named constant with a
//! config-file override, so score policy can change without touching the
//! scoring code. The weight vector is part of the emitted candidate, which
//! lets an audit reconstruct any historical aggregate.

use reunite_match_models::ScoreWeights;
use serde::{Deserialize, Serialize};

/// Default weight of the face sub-score in the aggregate.
pub const DEFAULT_FACE_WEIGHT: f64 = 0.5;
/// Default weight of the spatial/temporal sub-score.
pub const DEFAULT_METADATA_WEIGHT: f64 = 0.3;
/// Default weight of the descriptive-text sub-score.
pub const DEFAULT_TEXT_WEIGHT: f64 = 0.2;

/// Candidates below this aggregate are not emitted at all.
pub const DEFAULT_MIN_CANDIDATE_THRESHOLD: f64 = 0.5;

/// Face sub-score above which "Facial features" appears in the explanation.
pub const DEFAULT_FACE_SIGNIFICANCE: f64 = 0.7;
/// Metadata sub-score above which "Location proximity" appears.
pub const DEFAULT_METADATA_SIGNIFICANCE: f64 = 0.6;
/// Text sub-score above which "Clothing match" appears.
pub const DEFAULT_TEXT_SIGNIFICANCE: f64 = 0.5;

/// e-folding distance of the spatial decay, in kilometers.
pub const DEFAULT_DISTANCE_DECAY_KM: f64 = 50.0;
/// Elapsed days between last-seen and found within which time does not
/// penalize the metadata score.
pub const DEFAULT_PLAUSIBLE_WINDOW_DAYS: f64 = 30.0;
/// e-folding time of the decay applied beyond the plausible window, in days.
pub const DEFAULT_TIME_DECAY_DAYS: f64 = 30.0;

/// Aggregate at or above which a match is displayed as high confidence.
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.8;
/// Aggregate at or above which a match is displayed as medium confidence.
pub const MEDIUM_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Confidence band derived from an aggregate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    /// Aggregate ≥ the high-confidence threshold.
    High,
    /// Aggregate ≥ the medium-confidence threshold.
    Medium,
    /// Everything else that still cleared the candidate threshold.
    Low,
}

/// Error returned when a configuration fails validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML source could not be parsed.
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config file could not be read.
    #[error("Config file error: {0}")]
    Io(#[from] std::io::Error),

    /// A value violates the engine's constraints.
    #[error("Invalid config: {message}")]
    Invalid {
        /// Description of the violated constraint.
        message: String,
    },
}

/// Environment variable naming the scoring-policy TOML file.
pub const MATCH_CONFIG_PATH_ENV: &str = "MATCH_CONFIG_PATH";

/// Scoring policy for the match engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchConfig {
    /// Weight vector combining the three sub-scores; must sum to 1.
    pub weights: ScoreWeights,
    /// Aggregate below which no match is emitted.
    pub min_candidate_threshold: f64,
    /// Per-dimension significance threshold for the face sub-score.
    pub face_significance: f64,
    /// Per-dimension significance threshold for the metadata sub-score.
    pub metadata_significance: f64,
    /// Per-dimension significance threshold for the text sub-score.
    pub text_significance: f64,
    /// Spatial decay scale in kilometers.
    pub distance_decay_km: f64,
    /// Days between last-seen and found that carry no time penalty.
    pub plausible_window_days: f64,
    /// Decay scale applied to days beyond the plausible window.
    pub time_decay_days: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights {
                face: DEFAULT_FACE_WEIGHT,
                metadata: DEFAULT_METADATA_WEIGHT,
                text: DEFAULT_TEXT_WEIGHT,
            },
            min_candidate_threshold: DEFAULT_MIN_CANDIDATE_THRESHOLD,
            face_significance: DEFAULT_FACE_SIGNIFICANCE,
            metadata_significance: DEFAULT_METADATA_SIGNIFICANCE,
            text_significance: DEFAULT_TEXT_SIGNIFICANCE,
            distance_decay_km: DEFAULT_DISTANCE_DECAY_KM,
            plausible_window_days: DEFAULT_PLAUSIBLE_WINDOW_DAYS,
            time_decay_days: DEFAULT_TIME_DECAY_DAYS,
        }
    }
}

impl MatchConfig {
    /// Parses and validates a config from TOML.
    ///
    /// Missing keys fall back to the named defaults above.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if parsing fails or any value violates the
    /// engine's constraints.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config file named by [`MATCH_CONFIG_PATH_ENV`], or the
    /// defaults when the variable is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the named file cannot be read, parsed, or
    /// validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(MATCH_CONFIG_PATH_ENV) {
            Ok(path) => {
                let source = std::fs::read_to_string(&path)?;
                let config = Self::from_toml_str(&source)?;
                log::info!("Loaded match config from {path}");
                Ok(config)
            }
            Err(_) => Ok(Self::default()),
        }
    }

    /// Checks the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.weights.is_normalized() {
            return Err(ConfigError::Invalid {
                message: format!(
                    "weights ({}, {}, {}) must each be in [0, 1] and sum to 1",
                    self.weights.face, self.weights.metadata, self.weights.text
                ),
            });
        }

        for (name, value) in [
            ("minCandidateThreshold", self.min_candidate_threshold),
            ("faceSignificance", self.face_significance),
            ("metadataSignificance", self.metadata_significance),
            ("textSignificance", self.text_significance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    message: format!("{name} must be in [0, 1], got {value}"),
                });
            }
        }

        for (name, value) in [
            ("distanceDecayKm", self.distance_decay_km),
            ("timeDecayDays", self.time_decay_days),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::Invalid {
                    message: format!("{name} must be positive, got {value}"),
                });
            }
        }

        if self.plausible_window_days < 0.0 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "plausibleWindowDays must be non-negative, got {}",
                    self.plausible_window_days
                ),
            });
        }

        Ok(())
    }

    /// Maps an aggregate score to its display confidence band.
    #[must_use]
    pub fn confidence(score: f64) -> Confidence {
        if score >= HIGH_CONFIDENCE_THRESHOLD {
            Confidence::High
        } else if score >= MEDIUM_CONFIDENCE_THRESHOLD {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        MatchConfig::default().validate().unwrap();
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let config = MatchConfig::from_toml_str(
            r#"
            minCandidateThreshold = 0.4
            distanceDecayKm = 25.0

            [weights]
            face = 0.6
            metadata = 0.2
            text = 0.2
            "#,
        )
        .unwrap();

        assert!((config.min_candidate_threshold - 0.4).abs() < 1e-12);
        assert!((config.distance_decay_km - 25.0).abs() < 1e-12);
        assert!((config.weights.face - 0.6).abs() < 1e-12);
        // Untouched keys keep their defaults.
        assert!((config.time_decay_days - DEFAULT_TIME_DECAY_DAYS).abs() < 1e-12);
    }

    #[test]
    fn unbalanced_weights_are_rejected() {
        let err = MatchConfig::from_toml_str(
            r#"
            [weights]
            face = 0.5
            metadata = 0.3
            text = 0.3
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn confidence_band_edges() {
        assert_eq!(MatchConfig::confidence(0.844), Confidence::High);
        assert_eq!(MatchConfig::confidence(0.8), Confidence::High);
        assert_eq!(MatchConfig::confidence(0.79), Confidence::Medium);
        assert_eq!(MatchConfig::confidence(0.6), Confidence::Medium);
        assert_eq!(MatchConfig::confidence(0.59), Confidence::Low);
    }
}
