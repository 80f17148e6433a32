use serde::{Deserialize, Serialize};

use crate::domain::OutcomeStatus;

/// Outcome tallies for one run, by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub success: usize,
    pub pending: usize,
    pub error: usize,
    pub retraining_triggered: usize,
    pub model_review_triggered: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, status: OutcomeStatus) {
        let slot = match status {
            OutcomeStatus::Success => &mut self.success,
            OutcomeStatus::Pending => &mut self.pending,
            OutcomeStatus::Error => &mut self.error,
            OutcomeStatus::RetrainingTriggered => &mut self.retraining_triggered,
            OutcomeStatus::ModelReviewTriggered => &mut self.model_review_triggered,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.success
            + self.pending
            + self.error
            + self.retraining_triggered
            + self.model_review_triggered
    }
}
