//! Reporter: terminal stage, compiles and delivers a report.
//!
//! Delivery failures are logged and otherwise ignored.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Stage, StageContext};
use crate::config::Platform;
use crate::domain::{
    Outcome, PerformanceSummary, Report, ReportType, StageError, StageInput, StageType,
    TaskEnvelope, ValueBet,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterInput {
    pub report_type: ReportType,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub value_bets: Vec<ValueBet>,

    /// Delivery targets; the configured platforms when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<Platform>>,
}

impl StageInput for ReporterInput {
    const STAGE: StageType = StageType::Reporter;
}

pub struct Reporter;

impl Reporter {
    fn compile(input: ReporterInput, ctx: &StageContext<'_>) -> Report {
        let performance = PerformanceSummary {
            win_rate: ctx.ledgers.performance.win_rate(),
            roi: ctx.ledgers.budget.roi(),
            settled: ctx.ledgers.performance.len(),
            wins: ctx.ledgers.performance.wins(),
        };
        Report {
            report_type: input.report_type,
            value_bets: input.value_bets,
            performance,
            generated_at: ctx.now(),
        }
    }
}

#[async_trait]
impl Stage for Reporter {
    fn stage_type(&self) -> StageType {
        StageType::Reporter
    }

    async fn execute(
        &self,
        envelope: &TaskEnvelope,
        ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        let mut input: ReporterInput = envelope.decode()?;
        let platforms = input
            .platforms
            .take()
            .unwrap_or_else(|| ctx.config.report_platforms.clone());
        let report = Self::compile(input, ctx);

        let mut delivered = Vec::new();
        for platform in platforms {
            let sent = match platform {
                Platform::Notification => match &ctx.caps.notifier {
                    Some(sink) => sink.send(&report).await.map(|_| true),
                    None => Ok(false),
                },
                Platform::Dashboard => match &ctx.caps.dashboard {
                    Some(sink) => sink.publish(&report).await.map(|_| true),
                    None => Ok(false),
                },
            };
            match sent {
                Ok(true) => delivered.push(platform),
                Ok(false) => warn!(?platform, "no sink configured for platform"),
                Err(e) => warn!(?platform, error = %e, "report delivery failed"),
            }
        }
        info!(
            report_type = ?report.report_type,
            value_bets = report.value_bets.len(),
            delivered = delivered.len(),
            "report compiled"
        );

        let delivered = serde_json::to_value(&delivered).unwrap_or_default();
        let report = serde_json::to_value(&report).unwrap_or_default();
        Ok(Outcome::success()
            .with("delivered", delivered)
            .with("report", report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::BetType;
    use crate::impls::InMemoryDashboard;
    use crate::ledger::{BetResult, PerformanceEntry};
    use crate::testing::{FailingNotifier, TestHarness};

    fn bet() -> ValueBet {
        ValueBet {
            match_id: "101".to_string(),
            home_team: "Sundowns".to_string(),
            away_team: "Pirates".to_string(),
            prediction: false,
            confidence: 0.4,
            probability: 0.6,
            bookmaker_odds: 2.5,
            value_score: 0.2,
            bet_type: BetType::Undervalue,
        }
    }

    #[tokio::test]
    async fn report_carries_ledger_metrics_and_survives_failed_sink() {
        let mut h = TestHarness::new();
        let dashboard = Arc::new(InMemoryDashboard::default());
        h.caps = h
            .caps
            .clone()
            .with_dashboard(dashboard.clone())
            .with_notifier(Arc::new(FailingNotifier));
        h.ledgers.budget.charge(1000.0).unwrap();
        let now = h.now();
        for outcome in [BetResult::Win, BetResult::Loss, BetResult::Win, BetResult::Win] {
            h.ledgers
                .performance
                .record(PerformanceEntry {
                    agent_id: "quality_reviewer".to_string(),
                    timestamp: now,
                    outcome,
                    confidence: 0.8,
                    cost: 0.0,
                })
                .unwrap();
        }

        let env = h.envelope(&ReporterInput {
            report_type: ReportType::ValueBets,
            value_bets: vec![bet()],
            platforms: None,
        });
        let out = h.run(&Reporter, &env).await.unwrap();

        assert!(out.spawned.is_empty());
        assert_eq!(out.payload["delivered"], serde_json::json!(["dashboard"]));

        let published = dashboard.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].value_bets.len(), 1);
        assert!((published[0].performance.win_rate - 0.75).abs() < 1e-12);
        assert!((published[0].performance.roi + 0.1).abs() < 1e-12);
    }

    #[tokio::test]
    async fn platform_selection_is_per_envelope() {
        let mut h = TestHarness::new();
        let dashboard = Arc::new(InMemoryDashboard::default());
        h.caps = h.caps.clone().with_dashboard(dashboard.clone());

        let env = h.envelope(&ReporterInput {
            report_type: ReportType::PerformanceUpdate,
            value_bets: vec![],
            platforms: Some(vec![Platform::Notification]),
        });
        let out = h.run(&Reporter, &env).await.unwrap();

        assert_eq!(out.payload["delivered"], serde_json::json!([]));
        assert!(dashboard.published().is_empty());
    }
}
