//! Run configuration: budgets, thresholds and wiring choices.
//!
//! Every branching predicate a stage evaluates reads its threshold from
//! here. The config is read-only once the conductor is built.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the conductor does when a stage returns a fault it did not contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Record the fault as an error outcome and keep running.
    #[default]
    Contain,
    /// Record the fault, then stop the whole run.
    Abort,
}

/// Report delivery targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[serde(alias = "telegram")]
    Notification,
    Dashboard,
}

/// Confidence buckets used by prediction validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewBands {
    /// `confidence >= high` is a high-confidence prediction.
    pub high: f64,
    /// `medium <= confidence < high` is medium; anything lower is low.
    pub medium: f64,
    /// Review the model when `low / total` exceeds this fraction.
    pub max_low_fraction: f64,
}

impl Default for ReviewBands {
    fn default() -> Self {
        Self {
            high: 0.7,
            medium: 0.6,
            max_low_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub initial_budget: f64,

    /// At or below this level the run loop pauses for `cooldown_ms`.
    pub critical_budget: f64,
    pub cooldown_ms: u64,

    /// Minimum validation accuracy before a retrain is requested.
    pub performance_threshold: f64,

    /// Minimum `|value_score|` for a prediction to count as a value bet.
    pub value_threshold: f64,

    /// Probability at or above which the predictor says "yes".
    pub min_confidence: f64,

    pub review: ReviewBands,
    pub cv_folds: usize,

    /// Odds sources the collector walks, in order.
    pub sources: Vec<String>,
    pub market: String,
    pub target: String,

    /// Registry key the trainer overwrites and the predictor reads.
    pub model_key: String,
    pub model_type: String,
    pub retrain_model_type: String,

    /// Registrations kept per registry key (the last one is current).
    pub registry_history: usize,

    pub cost_per_record: f64,
    pub fault_policy: FaultPolicy,

    /// Stop after this many executed envelopes (unbounded when None).
    pub max_envelopes: Option<usize>,

    pub report_platforms: Vec<Platform>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            initial_budget: 10_000.0,
            critical_budget: 1_000.0,
            cooldown_ms: 60 * 60 * 1000,
            performance_threshold: 0.65,
            value_threshold: 0.15,
            min_confidence: 0.7,
            review: ReviewBands::default(),
            cv_folds: 5,
            sources: vec!["Hollywoodbets".to_string(), "Betway".to_string()],
            market: "DC_BTTS".to_string(),
            target: "dc_btts".to_string(),
            model_key: "dc_btts_predictor".to_string(),
            model_type: "hybrid".to_string(),
            retrain_model_type: "ensemble".to_string(),
            registry_history: 5,
            cost_per_record: 0.01,
            fault_policy: FaultPolicy::Contain,
            max_envelopes: None,
            report_platforms: vec![Platform::Notification, Platform::Dashboard],
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{0}")]
    Invalid(String),
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

impl PipelineConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("initial_budget", self.initial_budget, 0.0, f64::MAX)?;
        check_range("critical_budget", self.critical_budget, 0.0, f64::MAX)?;
        check_range("performance_threshold", self.performance_threshold, 0.0, 1.0)?;
        check_range("value_threshold", self.value_threshold, 0.0, 1.0)?;
        check_range("min_confidence", self.min_confidence, 0.0, 1.0)?;
        check_range("review.high", self.review.high, 0.0, 1.0)?;
        check_range("review.medium", self.review.medium, 0.0, self.review.high)?;
        check_range("review.max_low_fraction", self.review.max_low_fraction, 0.0, 1.0)?;
        check_range("cost_per_record", self.cost_per_record, 0.0, f64::MAX)?;

        if self.cv_folds < 2 {
            return Err(ConfigError::Invalid(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.registry_history == 0 {
            return Err(ConfigError::Invalid(
                "registry_history must keep at least one registration".to_string(),
            ));
        }
        if self.model_key.trim().is_empty() {
            return Err(ConfigError::Invalid("model_key must not be empty".to_string()));
        }
        if self.max_envelopes == Some(0) {
            return Err(ConfigError::Invalid(
                "max_envelopes must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
