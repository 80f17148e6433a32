//! Error types and their place in the failure taxonomy.
//!
//! - Recoverable conditions (fetch failures, missing model, bad prediction
//!   schema) are handled inside the stage and show up as an `Outcome`.
//! - `StageError` is what a stage returns when it could NOT contain a fault.
//!   The conductor's `FaultPolicy` decides whether that becomes an error
//!   outcome or aborts the run.
//! - `ConductorError` covers submission and run-level failures.

use thiserror::Error;

use super::ids::EnvelopeId;
use super::stage_type::StageType;
use crate::config::ConfigError;
use crate::ledger::LedgerError;
use crate::ports::{ModelError, StoreError};

/// A fault raised out of `Stage::execute`.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("failed to decode {stage} input: {reason}")]
    Decode { stage: StageType, reason: String },

    #[error("failed to encode {stage} input: {reason}")]
    Encode { stage: StageType, reason: String },

    #[error("no stage registered for stage_type={0}")]
    Unregistered(StageType),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("dataset store error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ConductorError {
    #[error("no stage registered for stage_type={0}")]
    UnknownStage(StageType),

    #[error("duplicate stage for stage_type={0}")]
    DuplicateStage(StageType),

    #[error("invalid spec: {0}")]
    InvalidSpec(#[source] StageError),

    #[error("run aborted by envelope {envelope_id} ({stage}): {fault}")]
    RunAborted {
        envelope_id: EnvelopeId,
        stage: StageType,
        fault: StageError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
