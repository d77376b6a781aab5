use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{ScoringConfig, ScoringWeights};
use crate::error::{ConfigError, ModelError, ScoringError};
use crate::models::DerivedRecord;

/// A trained probability model. Implementations must be deterministic.
pub trait Model: Send + Sync {
    fn predict(&self, record: &DerivedRecord) -> Result<f64, ModelError>;
}

/// Logistic model over exported coefficients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticModel {
    pub intercept: f64,
    pub attendance_rate: f64,
    /// Applied to academic performance scaled into [0,1].
    pub academic: f64,
    pub absent_days: f64,
    pub grade: f64,
    pub meal_assisted: f64,
}

impl LogisticModel {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Model for LogisticModel {
    fn predict(&self, derived: &DerivedRecord) -> Result<f64, ModelError> {
        let record = &derived.record;
        let meal = if record.meal_code.is_assisted() { 1.0 } else { 0.0 };
        let z = self.intercept
            + self.attendance_rate * derived.attendance_rate
            + self.academic * (record.academic_performance / 100.0)
            + self.absent_days * f64::from(record.absent_days)
            + self.grade * f64::from(record.grade)
            + self.meal_assisted * meal;
        let probability = 1.0 / (1.0 + (-z).exp());
        if probability.is_finite() {
            Ok(probability)
        } else {
            Err(ModelError::NonFinite(probability))
        }
    }
}

/// Fixed linear blend of the attendance gap and the academic gap.
pub fn heuristic_risk(derived: &DerivedRecord, weights: &ScoringWeights) -> f64 {
    let attendance_gap = 1.0 - derived.attendance_rate;
    let academic_gap = 1.0 - derived.record.academic_performance / 100.0;
    (weights.attendance * attendance_gap + weights.academic * academic_gap).clamp(0.0, 1.0)
}

fn bound_prediction(value: f64) -> Result<f64, ScoringError> {
    if value.is_finite() {
        Ok(value.clamp(0.0, 1.0))
    } else {
        Err(ModelError::NonFinite(value).into())
    }
}

#[derive(Clone)]
pub struct Scorer {
    weights: ScoringWeights,
    model: Option<Arc<dyn Model>>,
    timeout: Duration,
}

impl Scorer {
    pub fn heuristic(config: &ScoringConfig) -> Self {
        Self {
            weights: config.weights,
            model: None,
            timeout: config.model_timeout(),
        }
    }

    pub fn with_model(config: &ScoringConfig, model: Arc<dyn Model>) -> Self {
        Self {
            model: Some(model),
            ..Self::heuristic(config)
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Scores one record on the calling thread with no time bound. Callers
    /// holding a model that may stall should use `score_bounded`.
    pub fn score(&self, derived: &DerivedRecord) -> Result<f64, ScoringError> {
        match &self.model {
            Some(model) => bound_prediction(model.predict(derived)?),
            None => Ok(heuristic_risk(derived, &self.weights)),
        }
    }

    /// Scores one record, running model inference on the blocking pool under
    /// the configured timeout. An inference still running when the timeout
    /// fires is abandoned and its result discarded.
    pub async fn score_bounded(&self, derived: &DerivedRecord) -> Result<f64, ScoringError> {
        let Some(model) = self.model.clone() else {
            return Ok(heuristic_risk(derived, &self.weights));
        };

        let record = derived.clone();
        let handle = tokio::task::spawn_blocking(move || model.predict(&record));
        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(prediction)) => bound_prediction(prediction?),
            Ok(Err(join_error)) => Err(ScoringError::Prediction(format!(
                "model task failed: {join_error}"
            ))),
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "model inference timed out");
                Err(ScoringError::Prediction(format!(
                    "model did not respond within {} ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}
