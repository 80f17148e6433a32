//! Report sink that writes to the tracing subscriber.

use std::fmt::Write;

use async_trait::async_trait;
use tracing::info;

use crate::domain::{BetType, Report};
use crate::ports::{DashboardSink, NotificationSink, SinkError};

/// Bets listed in a text report.
const TOP_BETS: usize = 3;

/// Plain-text rendering used for chat-style notifications.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let perf = &report.performance;
    let _ = writeln!(
        out,
        "Value bet report ({})",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(out, "Win rate: {:.2}%", perf.win_rate * 100.0);
    let _ = writeln!(out, "ROI: {:.2}%", perf.roi * 100.0);

    if report.value_bets.is_empty() {
        let _ = writeln!(out, "No value bets.");
        return out;
    }
    let _ = writeln!(out, "Top value bets:");
    for bet in report.value_bets.iter().take(TOP_BETS) {
        let marker = match bet.bet_type {
            BetType::Undervalue => "+",
            BetType::Overvalue => "-",
        };
        let _ = writeln!(
            out,
            "{marker} {} vs {} | {:?} | confidence {:.0}% | odds {} | value {:.3}",
            bet.home_team,
            bet.away_team,
            bet.bet_type,
            bet.confidence * 100.0,
            bet.bookmaker_odds,
            bet.value_score,
        );
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, report: &Report) -> Result<(), SinkError> {
        info!(target: "wager::notification", "\n{}", render_text(report));
        Ok(())
    }
}

#[async_trait]
impl DashboardSink for LogSink {
    async fn publish(&self, report: &Report) -> Result<(), SinkError> {
        let json = serde_json::to_string(report)
            .map_err(|e| SinkError::new("dashboard", e.to_string()))?;
        info!(target: "wager::dashboard", report = %json, "dashboard updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::domain::{PerformanceSummary, ReportType, ValueBet};

    fn bet(id: &str, value_score: f64) -> ValueBet {
        ValueBet {
            match_id: id.to_string(),
            home_team: format!("Home {id}"),
            away_team: format!("Away {id}"),
            prediction: true,
            confidence: 0.8,
            probability: 0.8,
            bookmaker_odds: 2.5,
            value_score,
            bet_type: BetType::from_value_score(value_score),
        }
    }

    #[test]
    fn text_report_lists_top_three_bets() {
        let report = Report {
            report_type: ReportType::ValueBets,
            value_bets: vec![bet("1", 0.4), bet("2", -0.3), bet("3", 0.2), bet("4", 0.2)],
            performance: PerformanceSummary {
                win_rate: 0.6,
                roi: -0.05,
                settled: 5,
                wins: 3,
            },
            generated_at: Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap(),
        };

        let text = render_text(&report);
        assert!(text.contains("Win rate: 60.00%"));
        assert!(text.contains("ROI: -5.00%"));
        assert!(text.contains("- Home 2 vs Away 2 | Overvalue"));
        assert!(!text.contains("Home 4"));
    }
}
