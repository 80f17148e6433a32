//! QualityReviewer: model and prediction quality gates.
//!
//! Three review modes:
//! - `cross_validation`: k-fold accuracy of the registered model type on
//!   the training dataset; below threshold requests a retrain.
//! - `prediction_validation`: schema + confidence distribution of a
//!   prediction set; too many low-confidence rows sends the model back for
//!   cross-validation instead of on to value identification.
//! - `result_verification`: reconcile the prediction log with final
//!   results and record wins and losses.

use async_trait::async_trait;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::reporter::ReporterInput;
use super::trainer::TrainerInput;
use super::value_identifier::ValueIdentifierInput;
use super::{Stage, StageContext};
use crate::config::{Platform, ReviewBands};
use crate::domain::{
    FeatureRow, Features, Outcome, OutcomeStatus, ReportType, StageError, StageInput, StageType,
    TaskEnvelope,
};
use crate::ledger::{BetResult, PerformanceEntry};

/// Columns every prediction row must carry.
pub const REQUIRED_COLUMNS: [&str; 5] =
    ["match_id", "home_team", "away_team", "prediction", "confidence"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    #[default]
    CrossValidation,
    PredictionValidation,
    ResultVerification,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityReviewerInput {
    pub review_type: ReviewMode,

    /// Prediction rows as produced upstream; validated here, so kept untyped.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub predictions: Vec<Value>,
}

impl StageInput for QualityReviewerInput {
    const STAGE: StageType = StageType::QualityReviewer;
}

/// Shuffled k-fold split of `0..n` into `(train, test)` index sets.
///
/// The first `n % k` folds get one extra test row.
pub fn kfold_splits<R: Rng + ?Sized>(
    n: usize,
    k: usize,
    rng: &mut R,
) -> Vec<(Vec<usize>, Vec<usize>)> {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let base = n / k;
    let extra = n % k;
    let mut start = 0;
    let mut folds = Vec::with_capacity(k);
    for fold in 0..k {
        let len = base + usize::from(fold < extra);
        let test = order[start..start + len].to_vec();
        let train = order[..start]
            .iter()
            .chain(&order[start + len..])
            .copied()
            .collect();
        folds.push((train, test));
        start += len;
    }
    folds
}

/// Confidence bucket counts for a prediction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfidenceBuckets {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ConfidenceBuckets {
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }

    /// Counts one prediction. Band edges belong to the higher bucket.
    pub fn record(&mut self, confidence: f64, bands: &ReviewBands) {
        if confidence >= bands.high {
            self.high += 1;
        } else if confidence >= bands.medium {
            self.medium += 1;
        } else {
            self.low += 1;
        }
    }

    pub fn low_fraction(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.low as f64 / total as f64,
        }
    }
}

pub struct QualityReviewer;

impl QualityReviewer {
    async fn cross_validate(&self, ctx: &mut StageContext<'_>) -> Result<Outcome, StageError> {
        let model_type = match ctx.ledgers.models.require(&ctx.config.model_key) {
            Ok(entry) => entry.model_type.clone(),
            Err(e) => return Ok(Outcome::error(format!("no model available for validation: {e}"))),
        };

        let rows: Vec<FeatureRow> = match ctx.caps.datasets.load_training_data().await {
            Ok(rows) => rows.into_iter().filter(|r| r.label.is_some()).collect(),
            Err(e) => return Ok(Outcome::error(format!("no training data available: {e}"))),
        };
        let k = ctx.config.cv_folds;
        if rows.len() < k {
            return Ok(Outcome::error(format!(
                "cross-validation needs at least {k} labelled rows, got {}",
                rows.len()
            )));
        }

        let splits = kfold_splits(rows.len(), k, &mut rand::thread_rng());
        let mut accuracies = Vec::with_capacity(k);
        for (train_idx, test_idx) in splits {
            let train: Vec<FeatureRow> = train_idx.iter().map(|&i| rows[i].clone()).collect();
            let test_features: Vec<Features> = test_idx.iter().map(|&i| rows[i].features).collect();

            let mut model = match ctx.caps.models.build(&model_type) {
                Ok(m) => m,
                Err(e) => return Ok(Outcome::error(e.to_string())),
            };
            if let Err(e) = model.train(&train, &ctx.config.target).await {
                return Ok(Outcome::error(format!("fold training failed: {e}")));
            }
            let probabilities = match model.predict(&test_features).await {
                Ok(p) => p,
                Err(e) => return Ok(Outcome::error(format!("fold prediction failed: {e}"))),
            };

            let correct = test_idx
                .iter()
                .zip(&probabilities)
                .filter(|&(&i, &p)| rows[i].label == Some(p >= 0.5))
                .count();
            accuracies.push(correct as f64 / test_idx.len().max(1) as f64);
        }

        let mean = accuracies.iter().sum::<f64>() / accuracies.len() as f64;
        info!(accuracy = mean, folds = k, "cross-validation finished");

        if mean < ctx.config.performance_threshold {
            let retrain = ctx.spawn(&TrainerInput {
                rows: None,
                model_type: Some(ctx.config.model_type.clone()),
                reason: Some(format!("cross-validation accuracy {mean:.4} below threshold")),
            })?;
            return Ok(Outcome::new(OutcomeStatus::RetrainingTriggered)
                .with("accuracy", mean)
                .spawn(retrain));
        }
        Ok(Outcome::success()
            .with("accuracy", mean)
            .with("folds", accuracies))
    }

    fn validate_predictions(
        &self,
        predictions: Vec<Value>,
        ctx: &StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        if predictions.is_empty() {
            return Ok(Outcome::error("no predictions to validate"));
        }

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|col| {
                predictions
                    .iter()
                    .any(|row| row.get(*col).is_none_or(Value::is_null))
            })
            .collect();
        if !missing.is_empty() {
            return Ok(Outcome::error(format!(
                "missing columns in predictions: {}",
                missing.join(", ")
            )));
        }

        let bands = ctx.config.review;
        let mut buckets = ConfidenceBuckets::default();
        for row in &predictions {
            let Some(confidence) = row.get("confidence").and_then(Value::as_f64) else {
                return Ok(Outcome::error("confidence must be numeric"));
            };
            buckets.record(confidence, &bands);
        }

        let low_fraction = buckets.low_fraction();
        if low_fraction > bands.max_low_fraction {
            info!(low_fraction, "too many low-confidence predictions, reviewing model");
            let review = ctx.spawn(&QualityReviewerInput {
                review_type: ReviewMode::CrossValidation,
                predictions: Vec::new(),
            })?;
            return Ok(Outcome::new(OutcomeStatus::ModelReviewTriggered)
                .with("low_confidence", buckets.low)
                .with("total", buckets.total())
                .spawn(review));
        }

        let next = ctx.spawn(&ValueIdentifierInput { predictions })?;
        Ok(Outcome::success()
            .with("high_confidence", buckets.high)
            .with("medium_confidence", buckets.medium)
            .with("low_confidence", buckets.low)
            .spawn(next))
    }

    async fn verify_results(&self, ctx: &mut StageContext<'_>) -> Result<Outcome, StageError> {
        let pending = ctx.ledgers.predictions.unverified();
        if pending.is_empty() {
            return Ok(Outcome::success().with("message", "no unverified predictions"));
        }

        let Some(results) = ctx.caps.results.as_ref() else {
            warn!("no result source configured");
            return Ok(Outcome::success().with("message", "no results available for verification"));
        };
        let match_ids: Vec<String> = pending
            .iter()
            .filter_map(|&i| ctx.ledgers.predictions.get(i))
            .map(|r| r.match_id.clone())
            .collect();
        let results = match results.fetch_results(&match_ids).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "result fetch failed");
                return Ok(
                    Outcome::success().with("message", "no results available for verification")
                );
            }
        };

        let now = ctx.now();
        let mut verified = 0usize;
        let mut wins = 0usize;
        for idx in pending {
            let Some(record) = ctx.ledgers.predictions.get(idx) else {
                continue;
            };
            let Some(result) = results.get(&record.match_id) else {
                continue;
            };
            let confidence = record.confidence;
            if !(0.0..=1.0).contains(&confidence) {
                warn!(
                    match_id = %record.match_id,
                    confidence,
                    "skipping prediction with invalid confidence"
                );
                continue;
            }
            let correct = record.prediction == result.market_landed();

            // A failed performance write must leave the prediction pending.
            ctx.ledgers.performance.record(PerformanceEntry {
                agent_id: StageType::QualityReviewer.to_string(),
                timestamp: now,
                outcome: BetResult::from(correct),
                confidence,
                cost: 0.0,
            })?;
            ctx.ledgers.predictions.mark_verified(idx, correct)?;
            verified += 1;
            wins += usize::from(correct);
        }

        if verified == 0 {
            return Ok(Outcome::success().with("message", "no results available for verification"));
        }

        let win_rate = wins as f64 / verified as f64;
        info!(verified, win_rate, "predictions reconciled");
        let report = ctx.spawn(&ReporterInput {
            report_type: ReportType::PerformanceUpdate,
            value_bets: Vec::new(),
            platforms: Some(vec![Platform::Dashboard]),
        })?;
        Ok(Outcome::success()
            .with("verified_count", verified)
            .with("win_rate", win_rate)
            .spawn(report))
    }
}

#[async_trait]
impl Stage for QualityReviewer {
    fn stage_type(&self) -> StageType {
        StageType::QualityReviewer
    }

    async fn execute(
        &self,
        envelope: &TaskEnvelope,
        ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        let input: QualityReviewerInput = match envelope.decode() {
            Ok(input) => input,
            Err(e) => return Ok(Outcome::error(e.to_string())),
        };

        match input.review_type {
            ReviewMode::CrossValidation => self.cross_validate(ctx).await,
            ReviewMode::PredictionValidation => self.validate_predictions(input.predictions, ctx),
            ReviewMode::ResultVerification => self.verify_results(ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;
    use serde_json::json;

    use crate::domain::{FullTime, MatchResult};
    use crate::impls::{InMemoryDatasetStore, StaticResultSource};
    use crate::testing::{ScriptedFactory, TestHarness, labelled_rows};

    fn prediction(id: &str, confidence: f64) -> Value {
        json!({
            "match_id": id,
            "home_team": "Pirates",
            "away_team": "Chiefs",
            "probability": confidence,
            "prediction": true,
            "confidence": confidence,
            "bookmaker_odds": 2.5,
        })
    }

    fn input(mode: ReviewMode, predictions: Vec<Value>) -> QualityReviewerInput {
        QualityReviewerInput {
            review_type: mode,
            predictions,
        }
    }

    #[test]
    fn kfold_covers_every_row_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let splits = kfold_splits(12, 5, &mut rng);
        assert_eq!(splits.len(), 5);

        let mut seen: Vec<usize> = splits.iter().flat_map(|(_, t)| t.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..12).collect::<Vec<_>>());

        let sizes: Vec<usize> = splits.iter().map(|(_, t)| t.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2, 2]);
        assert!(splits.iter().all(|(train, test)| train.len() + test.len() == 12));
    }

    #[tokio::test]
    async fn mostly_low_confidence_triggers_model_review() {
        let mut h = TestHarness::new();
        let preds = vec![
            prediction("1", 0.55),
            prediction("2", 0.52),
            prediction("3", 0.58),
            prediction("4", 0.75),
        ];
        let env = h.envelope(&input(ReviewMode::PredictionValidation, preds));
        let out = h.run(&QualityReviewer, &env).await.unwrap();

        assert_eq!(out.status, OutcomeStatus::ModelReviewTriggered);
        assert_eq!(out.spawned.len(), 1);
        let next: QualityReviewerInput = out.spawned[0].decode().unwrap();
        assert_eq!(next.review_type, ReviewMode::CrossValidation);
        assert!(out.spawned.iter().all(|e| e.stage_type() != StageType::ValueIdentifier));
    }

    #[tokio::test]
    async fn half_low_confidence_passes_to_value_identifier() {
        let mut h = TestHarness::new();
        let preds = vec![prediction("1", 0.55), prediction("2", 0.65)];
        let env = h.envelope(&input(ReviewMode::PredictionValidation, preds));
        let out = h.run(&QualityReviewer, &env).await.unwrap();

        assert_eq!(out.status, OutcomeStatus::Success);
        assert_eq!(out.payload["medium_confidence"], 1);
        let next: ValueIdentifierInput = out.spawned[0].decode().unwrap();
        assert_eq!(next.predictions.len(), 2);
    }

    #[rstest]
    #[case::high_edge(0.7, (1, 0, 0))]
    #[case::just_under_high(0.6999, (0, 1, 0))]
    #[case::medium_edge(0.6, (0, 1, 0))]
    #[case::just_under_medium(0.5999, (0, 0, 1))]
    fn band_edges_belong_to_the_higher_bucket(
        #[case] confidence: f64,
        #[case] expected: (usize, usize, usize),
    ) {
        let mut buckets = ConfidenceBuckets::default();
        buckets.record(confidence, &ReviewBands::default());
        assert_eq!((buckets.high, buckets.medium, buckets.low), expected);
    }

    #[tokio::test]
    async fn missing_columns_are_named() {
        let mut h = TestHarness::new();
        let preds = vec![json!({ "match_id": "1", "home_team": "A", "prediction": true })];
        let env = h.envelope(&input(ReviewMode::PredictionValidation, preds));
        let out = h.run(&QualityReviewer, &env).await.unwrap();

        assert!(out.is_error());
        assert_eq!(
            out.message(),
            Some("missing columns in predictions: away_team, confidence")
        );
        assert!(out.spawned.is_empty());
    }

    #[tokio::test]
    async fn empty_prediction_set_is_an_error() {
        let mut h = TestHarness::new();
        let env = h.envelope(&input(ReviewMode::PredictionValidation, vec![]));
        let out = h.run(&QualityReviewer, &env).await.unwrap();
        assert_eq!(out.message(), Some("no predictions to validate"));
    }

    #[tokio::test]
    async fn unknown_review_type_is_an_error_outcome() {
        let mut h = TestHarness::new();
        let mut spec = crate::domain::Spec::new();
        spec.insert("review_type".to_string(), json!("vibes_check"));
        let env = h.envelope_raw(StageType::QualityReviewer, spec);

        let out = h.run(&QualityReviewer, &env).await.unwrap();
        assert!(out.is_error());
    }

    #[tokio::test]
    async fn cross_validation_requires_a_model() {
        let mut h = TestHarness::new();
        let env = h.envelope(&input(ReviewMode::CrossValidation, vec![]));
        let out = h.run(&QualityReviewer, &env).await.unwrap();

        assert!(out.is_error());
        assert!(out.message().unwrap().contains("no model available"));
    }

    #[tokio::test]
    async fn weak_cross_validation_requests_retrain() {
        let mut h = TestHarness::new();
        h.register_model(0.9);
        // Constant 0.9 predicts "yes" everywhere; half the labels are false.
        h.caps.models = Arc::new(ScriptedFactory::with_probability(0.9));
        h.caps.datasets =
            Arc::new(InMemoryDatasetStore::default().with_training(labelled_rows(20)));

        let env = h.envelope(&input(ReviewMode::CrossValidation, vec![]));
        let out = h.run(&QualityReviewer, &env).await.unwrap();

        assert_eq!(out.status, OutcomeStatus::RetrainingTriggered);
        assert_eq!(out.spawned[0].stage_type(), StageType::Trainer);
        // Equal fold sizes, so the fold mean equals the overall hit rate.
        assert!((out.payload["accuracy"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn result_verification_settles_known_matches() {
        let mut h = TestHarness::new();
        let now = h.now();
        h.ledgers.predictions.append("101", true, 0.8, now);
        h.ledgers.predictions.append("102", true, 0.75, now);
        h.ledgers.predictions.append("999", false, 0.7, now);

        let results = HashMap::from([
            (
                "101".to_string(),
                MatchResult {
                    result: FullTime::HomeWin,
                    both_scored: true,
                },
            ),
            (
                "102".to_string(),
                MatchResult {
                    result: FullTime::Draw,
                    both_scored: false,
                },
            ),
        ]);
        h.caps = h.caps.clone().with_results(Arc::new(StaticResultSource::new(results)));

        let env = h.envelope(&input(ReviewMode::ResultVerification, vec![]));
        let out = h.run(&QualityReviewer, &env).await.unwrap();

        assert_eq!(out.payload["verified_count"], 2);
        assert_eq!(h.ledgers.predictions.unverified(), vec![2]);
        assert_eq!(h.ledgers.performance.len(), 2);
        assert_eq!(h.ledgers.performance.wins(), 1);

        let report: ReporterInput = out.spawned[0].decode().unwrap();
        assert_eq!(report.report_type, ReportType::PerformanceUpdate);
        assert_eq!(report.platforms, Some(vec![Platform::Dashboard]));
    }

    #[tokio::test]
    async fn result_verification_skips_non_finite_confidence() {
        let mut h = TestHarness::new();
        let now = h.now();
        h.ledgers.predictions.append("101", true, f64::NAN, now);
        h.ledgers.predictions.append("102", true, 0.8, now);

        let home_win = MatchResult {
            result: FullTime::HomeWin,
            both_scored: true,
        };
        let results = HashMap::from([
            ("101".to_string(), home_win),
            ("102".to_string(), home_win),
        ]);
        h.caps = h.caps.clone().with_results(Arc::new(StaticResultSource::new(results)));

        let env = h.envelope(&input(ReviewMode::ResultVerification, vec![]));
        let out = h.run(&QualityReviewer, &env).await.unwrap();

        assert_eq!(out.status, OutcomeStatus::Success);
        assert_eq!(out.payload["verified_count"], 1);
        assert_eq!(h.ledgers.predictions.unverified(), vec![0]);
        assert_eq!(h.ledgers.performance.len(), 1);
        assert_eq!(out.spawned[0].stage_type(), StageType::Reporter);
    }

    #[tokio::test]
    async fn result_verification_without_results_spawns_nothing() {
        let mut h = TestHarness::new();
        let now = h.now();
        h.ledgers.predictions.append("101", true, 0.8, now);
        h.caps = h
            .caps
            .clone()
            .with_results(Arc::new(StaticResultSource::new(HashMap::new())));

        let env = h.envelope(&input(ReviewMode::ResultVerification, vec![]));
        let out = h.run(&QualityReviewer, &env).await.unwrap();

        assert_eq!(out.status, OutcomeStatus::Success);
        assert!(out.spawned.is_empty());
        assert_eq!(h.ledgers.predictions.unverified(), vec![0]);
    }
}
