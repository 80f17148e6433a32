//! ValueIdentifier: find predictions whose model probability disagrees with
//! the bookmaker's implied probability by more than the value threshold.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::maintenance::ValueAnalyzerInput;
use super::reporter::ReporterInput;
use super::{Stage, StageContext};
use crate::domain::{
    BetType, Outcome, Prediction, ReportType, StageError, StageInput, StageType, TaskEnvelope,
    ValueBet,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueIdentifierInput {
    pub predictions: Vec<Value>,
}

impl StageInput for ValueIdentifierInput {
    const STAGE: StageType = StageType::ValueIdentifier;
}

/// `Some` when the prediction's recomputed value clears `threshold`.
pub fn evaluate(p: &Prediction, threshold: f64) -> Option<ValueBet> {
    let odds = p.bookmaker_odds.filter(|o| o.is_finite() && *o > 0.0)?;
    let value_score = p.probability - 1.0 / odds;
    if value_score.abs() <= threshold {
        return None;
    }
    Some(ValueBet {
        match_id: p.match_id.clone(),
        home_team: p.home_team.clone(),
        away_team: p.away_team.clone(),
        prediction: p.prediction,
        confidence: p.confidence,
        probability: p.probability,
        bookmaker_odds: odds,
        value_score,
        bet_type: BetType::from_value_score(value_score),
    })
}

pub struct ValueIdentifier;

#[async_trait]
impl Stage for ValueIdentifier {
    fn stage_type(&self) -> StageType {
        StageType::ValueIdentifier
    }

    async fn execute(
        &self,
        envelope: &TaskEnvelope,
        ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        let input: ValueIdentifierInput = envelope.decode()?;
        let threshold = ctx.config.value_threshold;

        let mut skipped = 0usize;
        let mut value_bets = Vec::new();
        for row in input.predictions {
            let prediction: Prediction = match serde_json::from_value(row) {
                Ok(p) => p,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable prediction row");
                    skipped += 1;
                    continue;
                }
            };
            if let Some(bet) = evaluate(&prediction, threshold) {
                value_bets.push(bet);
            }
        }
        info!(value_bets = value_bets.len(), skipped, threshold, "value bets identified");

        let mut outcome = Outcome::success()
            .with("value_bets", value_bets.len())
            .with("skipped", skipped);
        if !value_bets.is_empty() {
            outcome = outcome.spawn(ctx.spawn(&ValueAnalyzerInput {
                value_bets: value_bets.clone(),
            })?);
        }
        let report = ctx.spawn(&ReporterInput {
            report_type: ReportType::ValueBets,
            value_bets,
            platforms: None,
        })?;
        Ok(outcome.spawn(report))
    }
}
