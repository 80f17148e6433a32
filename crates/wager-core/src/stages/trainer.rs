//! Trainer and Retrainer.
//!
//! The trainer always registers what it trained (last write wins) and always
//! hands over to the predictor. A weak model additionally gets a challenger
//! trained by the retrainer, which only replaces it if it scores higher.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::predictor::PredictorInput;
use super::{Stage, StageContext};
use crate::domain::{FeatureRow, Outcome, StageError, StageInput, StageType, TaskEnvelope};
use crate::ledger::ModelEntry;
use crate::ports::{ModelError, StoreError, TrainableModel};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerInput {
    /// Rows from the feature engineer. When absent, or when none carry a
    /// label, the stored training dataset is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<FeatureRow>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,

    /// Why this training was requested (bootstrap, review, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StageInput for TrainerInput {
    const STAGE: StageType = StageType::Trainer;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrainerInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<FeatureRow>>,
    pub previous_accuracy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
}

impl StageInput for RetrainerInput {
    const STAGE: StageType = StageType::Retrainer;
}

/// Labelled rows from `rows`, or the stored training dataset if there are none.
async fn training_rows(
    rows: Option<Vec<FeatureRow>>,
    ctx: &StageContext<'_>,
) -> Result<Vec<FeatureRow>, StoreError> {
    let labelled: Vec<FeatureRow> = rows
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.label.is_some())
        .collect();
    if !labelled.is_empty() {
        return Ok(labelled);
    }
    ctx.caps.datasets.load_training_data().await
}

async fn fit(
    ctx: &StageContext<'_>,
    model_type: &str,
    rows: &[FeatureRow],
) -> Result<(Box<dyn TrainableModel>, f64), ModelError> {
    let mut model = ctx.caps.models.build(model_type)?;
    let accuracy = model.train(rows, &ctx.config.target).await?;
    Ok((model, accuracy.clamp(0.0, 1.0)))
}

pub struct Trainer;

#[async_trait]
impl Stage for Trainer {
    fn stage_type(&self) -> StageType {
        StageType::Trainer
    }

    async fn execute(
        &self,
        envelope: &TaskEnvelope,
        ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        let input: TrainerInput = envelope.decode()?;
        let model_type = input
            .model_type
            .unwrap_or_else(|| ctx.config.model_type.clone());

        let rows = match training_rows(input.rows, ctx).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "no training data");
                return Ok(Outcome::error(format!("no training data: {e}")));
            }
        };

        let (model, accuracy) = match fit(ctx, &model_type, &rows).await {
            Ok(trained) => trained,
            Err(e) => {
                warn!(error = %e, model_type = %model_type, "training failed");
                return Ok(Outcome::error(e.to_string()));
            }
        };
        info!(accuracy, model_type = %model_type, rows = rows.len(), "model trained");

        let key = ctx.config.model_key.clone();
        ctx.ledgers.models.register(
            key.as_str(),
            ModelEntry {
                handle: model.into(),
                model_type: model_type.clone(),
                version: ctx.envelope_id.to_string(),
                accuracy: Some(accuracy),
                registered_at: ctx.now(),
            },
        );

        let mut outcome = Outcome::success()
            .with("accuracy", accuracy)
            .with("model_type", model_type)
            .with("rows", rows.len());
        if let Some(reason) = input.reason {
            outcome = outcome.with("reason", reason);
        }

        if accuracy < ctx.config.performance_threshold {
            info!(
                accuracy,
                threshold = ctx.config.performance_threshold,
                "accuracy below threshold, requesting retrain"
            );
            outcome = outcome.spawn(ctx.spawn(&RetrainerInput {
                rows: Some(rows),
                previous_accuracy: accuracy,
                model_type: Some(ctx.config.retrain_model_type.clone()),
            })?);
        }

        Ok(outcome.spawn(ctx.spawn(&PredictorInput::default())?))
    }
}

pub struct Retrainer;

#[async_trait]
impl Stage for Retrainer {
    fn stage_type(&self) -> StageType {
        StageType::Retrainer
    }

    async fn execute(
        &self,
        envelope: &TaskEnvelope,
        ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        let input: RetrainerInput = envelope.decode()?;
        let model_type = input
            .model_type
            .unwrap_or_else(|| ctx.config.retrain_model_type.clone());

        let rows = match training_rows(input.rows, ctx).await {
            Ok(rows) => rows,
            Err(e) => return Ok(Outcome::error(format!("no training data: {e}"))),
        };
        let (challenger, accuracy) = match fit(ctx, &model_type, &rows).await {
            Ok(trained) => trained,
            Err(e) => {
                warn!(error = %e, model_type = %model_type, "challenger training failed");
                return Ok(Outcome::error(e.to_string()));
            }
        };

        let promoted = accuracy > input.previous_accuracy;
        if promoted {
            let key = ctx.config.model_key.clone();
            ctx.ledgers.models.register(
                key.as_str(),
                ModelEntry {
                    handle: challenger.into(),
                    model_type: model_type.clone(),
                    version: ctx.envelope_id.to_string(),
                    accuracy: Some(accuracy),
                    registered_at: ctx.now(),
                },
            );
        }
        info!(
            challenger_accuracy = accuracy,
            previous_accuracy = input.previous_accuracy,
            promoted,
            "retrain finished"
        );

        Ok(Outcome::success()
            .with("challenger_accuracy", accuracy)
            .with("previous_accuracy", input.previous_accuracy)
            .with("model_type", model_type)
            .with("promoted", promoted))
    }
}
