//! Stages: one unit of pipeline work per `StageType`.
//!
//! Design:
//! - A stage receives its envelope plus a `StageContext` (config, capabilities,
//!   ledgers, id/clock ports) and returns an `Outcome`.
//! - Recoverable failures are turned into outcomes inside the stage.
//!   `Err(StageError)` is reserved for faults the stage could not contain.
//! - Follow-up work is returned in `Outcome::spawned`; stages never touch
//!   the queue.

pub mod collector;
pub mod feature_engineer;
pub mod maintenance;
pub mod predictor;
pub mod quality_reviewer;
pub mod reporter;
pub mod trainer;
pub mod value_identifier;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::PipelineConfig;
use crate::domain::{
    ConductorError, EnvelopeId, Outcome, Spec, StageError, StageInput, StageType, TaskEnvelope,
};
use crate::ledger::Ledgers;
use crate::ports::{Capabilities, Clock, IdGenerator};

pub use collector::{Collector, CollectorInput};
pub use feature_engineer::{FeatureEngineer, FeatureEngineerInput, engineer_features};
pub use maintenance::{Repair, RepairInput, ValueAnalyzer, ValueAnalyzerInput};
pub use predictor::{Predictor, PredictorInput};
pub use quality_reviewer::{QualityReviewer, QualityReviewerInput, ReviewMode};
pub use reporter::{Reporter, ReporterInput};
pub use trainer::{Retrainer, RetrainerInput, Trainer, TrainerInput};
pub use value_identifier::{ValueIdentifier, ValueIdentifierInput};

/// Everything a stage may read or write during one execution.
///
/// Built by the conductor per envelope; the mutable ledger borrow ends when
/// `execute` returns.
pub struct StageContext<'a> {
    pub envelope_id: EnvelopeId,
    pub config: &'a PipelineConfig,
    pub caps: &'a Capabilities,
    pub ledgers: &'a mut Ledgers,
    pub ids: &'a dyn IdGenerator,
    pub clock: &'a dyn Clock,
}

impl StageContext<'_> {
    /// Build a follow-up envelope for a typed stage input.
    pub fn spawn<T: StageInput>(&self, input: &T) -> Result<TaskEnvelope, StageError> {
        Ok(self.spawn_raw(T::STAGE, input.to_spec()?))
    }

    pub fn spawn_raw(&self, stage_type: StageType, spec: Spec) -> TaskEnvelope {
        TaskEnvelope::new(self.ids.generate_envelope_id(), stage_type, spec)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn stage_type(&self) -> StageType;

    async fn execute(
        &self,
        envelope: &TaskEnvelope,
        ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError>;
}

/// Registry of stages (stage_type -> stage).
///
/// Built before the run starts and read-only afterwards.
#[derive(Default)]
pub struct StageRegistry {
    stages: HashMap<StageType, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self {
            stages: HashMap::new(),
        }
    }

    /// Every built-in stage.
    pub fn standard() -> Self {
        let stages: [Arc<dyn Stage>; 10] = [
            Arc::new(Collector),
            Arc::new(FeatureEngineer),
            Arc::new(Trainer),
            Arc::new(Retrainer),
            Arc::new(Predictor),
            Arc::new(QualityReviewer),
            Arc::new(ValueIdentifier),
            Arc::new(ValueAnalyzer),
            Arc::new(Reporter),
            Arc::new(Repair),
        ];
        let mut reg = Self::new();
        for stage in stages {
            reg.replace(stage);
        }
        reg
    }

    /// Register a stage; a second stage for the same type is rejected.
    pub fn register(&mut self, stage: Arc<dyn Stage>) -> Result<(), ConductorError> {
        let stage_type = stage.stage_type();
        if self.stages.contains_key(&stage_type) {
            return Err(ConductorError::DuplicateStage(stage_type));
        }
        self.stages.insert(stage_type, stage);
        Ok(())
    }

    /// Register a stage, replacing any existing one for its type.
    pub fn replace(&mut self, stage: Arc<dyn Stage>) -> Option<Arc<dyn Stage>> {
        self.stages.insert(stage.stage_type(), stage)
    }

    pub fn get(&self, stage_type: StageType) -> Option<&Arc<dyn Stage>> {
        self.stages.get(&stage_type)
    }

    pub fn contains(&self, stage_type: StageType) -> bool {
        self.stages.contains_key(&stage_type)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
