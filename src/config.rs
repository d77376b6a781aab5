use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub attendance: f64,
    pub academic: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            attendance: 0.6,
            academic: 0.4,
        }
    }
}

/// Lower bounds of the Medium and High bands. Each bound belongs to the
/// band it opens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 0.3,
            high: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub thresholds: RiskThresholds,
    pub model_timeout_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            thresholds: RiskThresholds::default(),
            model_timeout_ms: 2_000,
        }
    }
}

impl ScoringConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: ScoringConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ScoringWeights {
            attendance,
            academic,
        } = self.weights;
        if !(attendance.is_finite() && academic.is_finite()) || attendance < 0.0 || academic < 0.0
        {
            return Err(ConfigError::Invalid(format!(
                "weights must be finite and non-negative (attendance {attendance}, academic {academic})"
            )));
        }

        let RiskThresholds { medium, high } = self.thresholds;
        if !(0.0..=1.0).contains(&medium) || !(0.0..=1.0).contains(&high) || medium > high {
            return Err(ConfigError::Invalid(format!(
                "thresholds must satisfy 0 <= medium <= high <= 1 (medium {medium}, high {high})"
            )));
        }

        if self.model_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "model_timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_constants() {
        let config = ScoringConfig::default();
        assert_eq!(config.weights.attendance, 0.6);
        assert_eq!(config.weights.academic, 0.4);
        assert_eq!(config.thresholds.medium, 0.3);
        assert_eq!(config.thresholds.high, 0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = ScoringConfig::from_json(r#"{"thresholds": {"high": 0.8}}"#).unwrap();
        assert_eq!(config.thresholds.high, 0.8);
        assert_eq!(config.thresholds.medium, 0.3);
        assert_eq!(config.weights, ScoringWeights::default());
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let err = ScoringConfig::from_json(r#"{"thresholds": {"medium": 0.8, "high": 0.5}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_negative_weights_and_zero_timeout() {
        assert!(ScoringConfig::from_json(r#"{"weights": {"attendance": -1.0}}"#).is_err());
        assert!(ScoringConfig::from_json(r#"{"model_timeout_ms": 0}"#).is_err());
    }
}
