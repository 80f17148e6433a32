//! Ledgers: the shared mutable state every stage reads and writes.
//!
//! Design:
//! - One `Ledgers` value per run, owned by the conductor's run state.
//! - Stages get `&mut Ledgers` through their context, one at a time, so no
//!   locking is needed.
//! - Every ledger is append-only except the budget level and the
//!   one-shot `verified` flag on prediction records.

pub mod budget;
pub mod checkpoints;
pub mod model_registry;
pub mod performance;
pub mod predictions;

use thiserror::Error;

pub use budget::BudgetMeter;
pub use checkpoints::{CheckpointEntry, CheckpointLog};
pub use model_registry::{ModelEntry, ModelHandle, ModelRegistry};
pub use performance::{BetResult, PerformanceEntry, PerformanceLog};
pub use predictions::{PredictionLog, PredictionRecord};

use crate::config::PipelineConfig;

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("no model registered under {0}")]
    ModelUnavailable(String),

    #[error("invalid charge amount: {0}")]
    InvalidCharge(f64),

    #[error("prediction record {0} is already verified")]
    AlreadyVerified(usize),

    #[error("no ledger entry at index {0}")]
    UnknownEntry(usize),

    #[error("snapshot {0} is already recorded")]
    DuplicateSnapshot(String),

    #[error("invalid entry: {0}")]
    InvalidEntry(String),
}

pub struct Ledgers {
    pub models: ModelRegistry,
    pub performance: PerformanceLog,
    pub predictions: PredictionLog,
    pub checkpoints: CheckpointLog,
    pub budget: BudgetMeter,
}

impl Ledgers {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            models: ModelRegistry::new(config.registry_history),
            performance: PerformanceLog::default(),
            predictions: PredictionLog::default(),
            checkpoints: CheckpointLog::default(),
            budget: BudgetMeter::new(config.initial_budget),
        }
    }
}
