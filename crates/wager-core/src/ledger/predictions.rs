//! Prediction log: every prediction made, later reconciled with results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LedgerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub match_id: String,
    pub prediction: bool,
    pub confidence: f64,
    pub verified: bool,
    pub timestamp: DateTime<Utc>,

    /// Set together with `verified`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct PredictionLog {
    records: Vec<PredictionRecord>,
}

impl PredictionLog {
    /// Append an unverified record; returns its index.
    pub fn append(
        &mut self,
        match_id: impl Into<String>,
        prediction: bool,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> usize {
        self.records.push(PredictionRecord {
            match_id: match_id.into(),
            prediction,
            confidence,
            verified: false,
            timestamp,
            correct: None,
        });
        self.records.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&PredictionRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Indices of records still waiting for a result.
    pub fn unverified(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.verified)
            .map(|(i, _)| i)
            .collect()
    }

    /// `verified` moves false -> true once; a second call is rejected.
    pub fn mark_verified(&mut self, index: usize, correct: bool) -> Result<(), LedgerError> {
        let record = self
            .records
            .get_mut(index)
            .ok_or(LedgerError::UnknownEntry(index))?;
        if record.verified {
            return Err(LedgerError::AlreadyVerified(index));
        }
        record.verified = true;
        record.correct = Some(correct);
        Ok(())
    }
}
