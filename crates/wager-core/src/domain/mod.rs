//! Domain model (ids, stage types, envelopes, outcomes, records, errors).

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod records;
pub mod stage_type;

pub use envelope::{Spec, StageInput, TaskEnvelope};
pub use errors::{ConductorError, StageError};
pub use ids::{EnvelopeId, SnapshotId};
pub use outcome::{Outcome, OutcomeStatus};
pub use records::{
    BetType, FeatureRow, Features, FullTime, MatchRecord, MatchResult, PerformanceSummary,
    Prediction, Report, ReportType, ValueBet,
};
pub use stage_type::{StageType, UnknownStageType};
