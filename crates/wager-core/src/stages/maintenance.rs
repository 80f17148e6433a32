//! Runtime-spawned side stages: source repair and value-bet analysis.
//! Neither spawns follow-up work.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Stage, StageContext};
use crate::domain::{Outcome, StageError, StageInput, StageType, TaskEnvelope, ValueBet};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairInput {
    pub source: String,
    pub error: String,
}

impl StageInput for RepairInput {
    const STAGE: StageType = StageType::Repair;
}

/// Records a failed source and checks whether a cached copy exists.
pub struct Repair;

#[async_trait]
impl Stage for Repair {
    fn stage_type(&self) -> StageType {
        StageType::Repair
    }

    async fn execute(
        &self,
        envelope: &TaskEnvelope,
        ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        let input: RepairInput = envelope.decode()?;
        warn!(source = %input.source, error = %input.error, "repairing odds source");

        let cached = match ctx.caps.datasets.load_historical(&input.source).await {
            Ok(records) => Some(records.len()),
            Err(e) => {
                warn!(source = %input.source, error = %e, "no cached dataset to fall back on");
                None
            }
        };

        let mut outcome = Outcome::success()
            .with("source", input.source)
            .with("error", input.error)
            .with("cache_available", cached.is_some());
        if let Some(n) = cached {
            outcome = outcome.with("cached_records", n);
        }
        Ok(outcome)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueAnalyzerInput {
    pub value_bets: Vec<ValueBet>,
}

impl StageInput for ValueAnalyzerInput {
    const STAGE: StageType = StageType::ValueAnalyzer;
}

/// Expected value and Kelly stake for one bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetAnalysis {
    pub match_id: String,
    /// Return per unit staked: `p * odds - 1`.
    pub expected_value: f64,
    /// Bankroll fraction, never negative.
    pub kelly_fraction: f64,
}

pub fn analyze(bet: &ValueBet) -> BetAnalysis {
    let p = bet.probability.clamp(0.0, 1.0);
    let odds = bet.bookmaker_odds;
    let b = odds - 1.0;
    let kelly = if b > 0.0 {
        ((b * p - (1.0 - p)) / b).max(0.0)
    } else {
        0.0
    };
    BetAnalysis {
        match_id: bet.match_id.clone(),
        expected_value: p * odds - 1.0,
        kelly_fraction: kelly,
    }
}

pub struct ValueAnalyzer;

#[async_trait]
impl Stage for ValueAnalyzer {
    fn stage_type(&self) -> StageType {
        StageType::ValueAnalyzer
    }

    async fn execute(
        &self,
        envelope: &TaskEnvelope,
        _ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        let input: ValueAnalyzerInput = envelope.decode()?;
        let analyses: Vec<BetAnalysis> = input.value_bets.iter().map(analyze).collect();
        let positive = analyses.iter().filter(|a| a.expected_value > 0.0).count();
        info!(bets = analyses.len(), positive, "value bets analyzed");

        let analyses = serde_json::to_value(&analyses).map_err(|e| StageError::Encode {
            stage: StageType::ValueAnalyzer,
            reason: e.to_string(),
        })?;
        Ok(Outcome::success()
            .with("positive_ev", positive)
            .with("analyses", analyses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::BetType;
    use crate::impls::InMemoryDatasetStore;
    use crate::testing::{TestHarness, records};

    fn bet(probability: f64, odds: f64) -> ValueBet {
        ValueBet {
            match_id: "101".to_string(),
            home_team: "Sundowns".to_string(),
            away_team: "Pirates".to_string(),
            prediction: false,
            confidence: 1.0 - probability,
            probability,
            bookmaker_odds: odds,
            value_score: probability - 1.0 / odds,
            bet_type: BetType::from_value_score(probability - 1.0 / odds),
        }
    }

    #[test]
    fn undervalued_bet_has_positive_ev_and_stake() {
        let a = analyze(&bet(0.6, 2.5));
        assert!((a.expected_value - 0.5).abs() < 1e-12);
        // (1.5 * 0.6 - 0.4) / 1.5
        assert!((a.kelly_fraction - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn overvalued_bet_gets_no_stake() {
        let a = analyze(&bet(0.1, 2.0));
        assert!(a.expected_value < 0.0);
        assert_eq!(a.kelly_fraction, 0.0);
    }

    #[tokio::test]
    async fn repair_reports_cache_availability() {
        let mut h = TestHarness::new();
        h.caps.datasets = Arc::new(InMemoryDatasetStore::default().with_historical("Betway", records(3)));

        let env = h.envelope(&RepairInput {
            source: "Betway".to_string(),
            error: "timeout".to_string(),
        });
        let out = h.run(&Repair, &env).await.unwrap();
        assert_eq!(out.payload["cache_available"], true);
        assert_eq!(out.payload["cached_records"], 3);
        assert!(out.spawned.is_empty());

        let env = h.envelope(&RepairInput {
            source: "Hollywoodbets".to_string(),
            error: "timeout".to_string(),
        });
        let out = h.run(&Repair, &env).await.unwrap();
        assert_eq!(out.payload["cache_available"], false);
    }
}
