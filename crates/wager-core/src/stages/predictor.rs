//! Predictor: score the latest fixtures with the registered model.
//!
//! Without a registered model the predictor asks for one (spawns a Trainer)
//! and reports `pending`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::quality_reviewer::{QualityReviewerInput, ReviewMode};
use super::trainer::TrainerInput;
use super::{Stage, StageContext};
use crate::domain::{
    FeatureRow, Features, Outcome, Prediction, StageError, StageInput, StageType, TaskEnvelope,
};
use crate::ports::StoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
}

impl StageInput for PredictorInput {
    const STAGE: StageType = StageType::Predictor;
}

/// Turn a raw probability into a prediction, joined with bookmaker odds.
pub fn score(
    row: &FeatureRow,
    probability: f64,
    min_confidence: f64,
    odds: Option<f64>,
) -> Prediction {
    let prediction = probability >= min_confidence;
    let confidence = if prediction { probability } else { 1.0 - probability };
    let odds = odds.filter(|o| o.is_finite() && *o > 0.0);
    let implied_probability = odds.map(|o| 1.0 / o);

    Prediction {
        match_id: row.match_id.clone(),
        home_team: row.home_team.clone(),
        away_team: row.away_team.clone(),
        probability,
        prediction,
        confidence,
        bookmaker_odds: odds,
        implied_probability,
        value_score: implied_probability.map(|ip| probability - ip),
    }
}

/// match_id -> decimal odds, first configured source wins.
async fn current_odds(ctx: &StageContext<'_>) -> HashMap<String, f64> {
    let mut odds = HashMap::new();
    for name in &ctx.config.sources {
        let Some(source) = ctx.caps.odds_source(name) else {
            continue;
        };
        match source.fetch(&ctx.config.market).await {
            Ok(records) => {
                for r in records {
                    if let Some(o) = r.odds {
                        odds.entry(r.match_id).or_insert(o);
                    }
                }
            }
            Err(e) => warn!(source = %name, error = %e, "odds unavailable for prediction join"),
        }
    }
    odds
}

pub struct Predictor;

#[async_trait]
impl Stage for Predictor {
    fn stage_type(&self) -> StageType {
        StageType::Predictor
    }

    async fn execute(
        &self,
        envelope: &TaskEnvelope,
        ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        let input: PredictorInput = envelope.decode()?;
        let min_confidence = input.min_confidence.unwrap_or(ctx.config.min_confidence);

        let Some(entry) = ctx.ledgers.models.get(&ctx.config.model_key) else {
            info!(model = %ctx.config.model_key, "no model registered, bootstrapping a trainer");
            let trainer = ctx.spawn(&TrainerInput {
                rows: None,
                model_type: Some(ctx.config.model_type.clone()),
                reason: Some("bootstrap".to_string()),
            })?;
            return Ok(Outcome::pending().spawn(trainer));
        };
        let model = entry.handle.clone();

        let rows = match ctx.caps.datasets.load_latest_processed().await {
            Ok(rows) => rows,
            Err(StoreError::NotFound(name)) => {
                warn!(dataset = %name, "no processed data, predicting nothing");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "processed data unreadable, predicting nothing");
                Vec::new()
            }
        };

        let features: Vec<Features> = rows.iter().map(|r| r.features).collect();
        let probabilities = if features.is_empty() {
            Vec::new()
        } else {
            match model.predict(&features).await {
                Ok(p) => p,
                Err(e) => return Ok(Outcome::error(format!("prediction failed: {e}"))),
            }
        };
        if probabilities.len() != rows.len() {
            return Ok(Outcome::error(format!(
                "model returned {} probabilities for {} rows",
                probabilities.len(),
                rows.len()
            )));
        }
        if let Some(bad) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Ok(Outcome::error(format!("model returned invalid probability {bad}")));
        }

        let odds = if rows.is_empty() {
            HashMap::new()
        } else {
            current_odds(ctx).await
        };

        let now = ctx.now();
        let mut predictions = Vec::with_capacity(rows.len());
        for (row, p) in rows.iter().zip(probabilities) {
            let scored = score(row, p, min_confidence, odds.get(&row.match_id).copied());
            ctx.ledgers
                .predictions
                .append(scored.match_id.clone(), scored.prediction, scored.confidence, now);
            predictions.push(scored);
        }
        info!(predictions = predictions.len(), "predictions generated");

        let values = predictions
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StageError::Encode {
                stage: StageType::QualityReviewer,
                reason: e.to_string(),
            })?;
        let review = ctx.spawn(&QualityReviewerInput {
            review_type: ReviewMode::PredictionValidation,
            predictions: values,
        })?;

        Ok(Outcome::success()
            .with("predictions", predictions.len())
            .with("min_confidence", min_confidence)
            .spawn(review))
    }
}
