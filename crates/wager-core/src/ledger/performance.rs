//! Performance log: one entry per settled bet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetResult {
    Win,
    Loss,
}

impl From<bool> for BetResult {
    fn from(correct: bool) -> Self {
        if correct { BetResult::Win } else { BetResult::Loss }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: BetResult,
    pub confidence: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PerformanceLog {
    entries: Vec<PerformanceEntry>,
}

impl PerformanceLog {
    pub fn record(&mut self, entry: PerformanceEntry) -> Result<(), LedgerError> {
        if !(0.0..=1.0).contains(&entry.confidence) {
            return Err(LedgerError::InvalidEntry(format!(
                "confidence {} outside [0, 1]",
                entry.confidence
            )));
        }
        if !entry.cost.is_finite() || entry.cost < 0.0 {
            return Err(LedgerError::InvalidEntry(format!(
                "cost {} must be non-negative",
                entry.cost
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[PerformanceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn wins(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == BetResult::Win)
            .count()
    }

    /// Fraction of wins; zero when nothing has settled.
    pub fn win_rate(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.wins() as f64 / self.entries.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(outcome: BetResult, confidence: f64) -> PerformanceEntry {
        PerformanceEntry {
            agent_id: "quality_reviewer".to_string(),
            timestamp: Utc::now(),
            outcome,
            confidence,
            cost: 0.0,
        }
    }

    #[test]
    fn win_rate_over_settled_entries() {
        let mut log = PerformanceLog::default();
        assert_eq!(log.win_rate(), 0.0);

        log.record(entry(BetResult::Win, 0.8)).unwrap();
        log.record(entry(BetResult::Loss, 0.7)).unwrap();
        log.record(entry(BetResult::Win, 0.9)).unwrap();

        assert_eq!(log.wins(), 2);
        assert!((log.win_rate() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let mut log = PerformanceLog::default();
        assert!(log.record(entry(BetResult::Win, 1.2)).is_err());
        assert!(log.is_empty());
    }
}
