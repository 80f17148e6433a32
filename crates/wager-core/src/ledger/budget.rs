//! Budget meter: a single scalar that only the collector draws down.

use serde::{Deserialize, Serialize};

use super::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetMeter {
    initial: f64,
    level: f64,
    spent: f64,
}

impl BudgetMeter {
    pub fn new(initial: f64) -> Self {
        Self {
            initial,
            level: initial,
            spent: 0.0,
        }
    }

    /// Deduct `amount`. The level never goes below zero; `spent` records
    /// the full amount requested.
    pub fn charge(&mut self, amount: f64) -> Result<f64, LedgerError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(LedgerError::InvalidCharge(amount));
        }
        self.level = (self.level - amount).max(0.0);
        self.spent += amount;
        Ok(self.level)
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn initial(&self) -> f64 {
        self.initial
    }

    pub fn spent(&self) -> f64 {
        self.spent
    }

    pub fn is_critical(&self, threshold: f64) -> bool {
        self.level <= threshold
    }

    /// `(level - initial) / initial`, zero for an empty starting budget.
    pub fn roi(&self) -> f64 {
        if self.initial > 0.0 {
            (self.level - self.initial) / self.initial
        } else {
            0.0
        }
    }
}
