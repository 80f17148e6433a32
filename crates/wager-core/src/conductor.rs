//! Conductor: owns the run state and drives the scheduling loop.
//!
//! Design:
//! - One FIFO queue. Spawned envelopes go to the tail in the order the
//!   stage returned them, so the work graph unfolds breadth-first.
//! - Exactly one envelope executes at a time; every dequeued envelope gets
//!   exactly one history entry.
//! - A budget at or below the critical level pauses the loop for the
//!   configured cooldown before the next envelope is dequeued.
//! - Faults a stage fails to contain are handled per `FaultPolicy`.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::{FaultPolicy, PipelineConfig};
use crate::domain::{
    ConductorError, EnvelopeId, Outcome, Spec, StageError, StageInput, StageType, TaskEnvelope,
};
use crate::ledger::{CheckpointEntry, Ledgers};
use crate::observability::OutcomeCounts;
use crate::ports::{Capabilities, Clock, IdGenerator, SystemClock, UlidGenerator};
use crate::stages::{StageContext, StageRegistry};

/// One executed envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub envelope_id: EnvelopeId,
    pub stage_type: StageType,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Not run yet, or still running.
    Idle,
    Completed,
    Aborted,
    EnvelopeLimitReached,
}

/// Summary of a run, serializable for the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub executed: usize,
    pub counts: OutcomeCounts,
    pub cooldowns: u32,
    pub budget_level: f64,
    /// Envelopes left in the queue.
    pub pending: usize,
}

/// Queue, history and ledgers of a run.
pub struct RunState {
    queue: VecDeque<TaskEnvelope>,
    history: Vec<HistoryEntry>,
    ledgers: Ledgers,
    seen: HashSet<EnvelopeId>,
    counts: OutcomeCounts,
    cooldowns: u32,
    status: RunStatus,
}

impl RunState {
    fn new(config: &PipelineConfig) -> Self {
        Self {
            queue: VecDeque::new(),
            history: Vec::new(),
            ledgers: Ledgers::new(config),
            seen: HashSet::new(),
            counts: OutcomeCounts::default(),
            cooldowns: 0,
            status: RunStatus::Idle,
        }
    }

    /// Append to the tail unless the id was already issued this run.
    fn enqueue(&mut self, envelope: TaskEnvelope) -> bool {
        if !self.seen.insert(envelope.id()) {
            return false;
        }
        self.queue.push_back(envelope);
        true
    }

    fn record(&mut self, entry: HistoryEntry) {
        self.counts.record(entry.outcome.status);
        self.history.push(entry);
    }
}

pub struct Conductor {
    config: PipelineConfig,
    caps: Capabilities,
    stages: StageRegistry,
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,
    state: RunState,
}

impl Conductor {
    /// Build a conductor with every built-in stage registered.
    pub fn new(config: PipelineConfig, caps: Capabilities) -> Result<Self, ConductorError> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Ok(Self {
            state: RunState::new(&config),
            ids: Box::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
            stages: StageRegistry::standard(),
            config,
            caps,
        })
    }

    pub fn with_stages(mut self, stages: StageRegistry) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ids = Box::new(UlidGenerator::new(Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.state.history
    }

    pub fn ledgers(&self) -> &Ledgers {
        &self.state.ledgers
    }

    pub fn queue_len(&self) -> usize {
        self.state.queue.len()
    }

    /// Enqueue a new envelope for a registered stage type.
    pub fn submit(
        &mut self,
        stage_type: StageType,
        spec: Spec,
    ) -> Result<EnvelopeId, ConductorError> {
        if !self.stages.contains(stage_type) {
            return Err(ConductorError::UnknownStage(stage_type));
        }
        let envelope = TaskEnvelope::new(self.ids.generate_envelope_id(), stage_type, spec);
        let id = envelope.id();
        self.state.enqueue(envelope);
        info!(envelope_id = %id, stage = %stage_type, "submitted");
        Ok(id)
    }

    pub fn submit_input<T: StageInput>(
        &mut self,
        input: &T,
    ) -> Result<EnvelopeId, ConductorError> {
        let spec = input.to_spec().map_err(ConductorError::InvalidSpec)?;
        self.submit(T::STAGE, spec)
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            status: self.state.status,
            executed: self.state.history.len(),
            counts: self.state.counts,
            cooldowns: self.state.cooldowns,
            budget_level: self.state.ledgers.budget.level(),
            pending: self.state.queue.len(),
        }
    }

    /// Run until the queue drains, the envelope cap is hit, or a fault
    /// aborts the run under `FaultPolicy::Abort`.
    pub async fn run(&mut self) -> Result<RunReport, ConductorError> {
        self.state.status = RunStatus::Idle;
        loop {
            if let Some(max) = self.config.max_envelopes
                && self.state.history.len() >= max
                && !self.state.queue.is_empty()
            {
                warn!(max, pending = self.state.queue.len(), "envelope limit reached");
                self.state.status = RunStatus::EnvelopeLimitReached;
                break;
            }

            let Some(envelope) = self.state.queue.pop_front() else {
                self.state.status = RunStatus::Completed;
                break;
            };
            let envelope_id = envelope.id();
            let stage_type = envelope.stage_type();

            self.checkpoint(&envelope).await;

            let started_at = self.clock.now();
            let span = info_span!("stage", envelope_id = %envelope_id, stage = %stage_type);
            let result = match self.stages.get(stage_type) {
                None => Err(StageError::Unregistered(stage_type)),
                Some(stage) => {
                    let stage = Arc::clone(stage);
                    let mut ctx = StageContext {
                        envelope_id,
                        config: &self.config,
                        caps: &self.caps,
                        ledgers: &mut self.state.ledgers,
                        ids: self.ids.as_ref(),
                        clock: self.clock.as_ref(),
                    };
                    stage.execute(&envelope, &mut ctx).instrument(span.clone()).await
                }
            };
            let finished_at = self.clock.now();

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(fault) => {
                    span.in_scope(|| {
                        error!(error = %fault, policy = ?self.config.fault_policy, "stage fault")
                    });

                    let recorded = Outcome::fault(&fault);
                    if self.config.fault_policy == FaultPolicy::Abort {
                        self.state.record(HistoryEntry {
                            envelope_id,
                            stage_type,
                            outcome: recorded,
                            started_at,
                            finished_at,
                        });
                        self.state.status = RunStatus::Aborted;
                        return Err(ConductorError::RunAborted {
                            envelope_id,
                            stage: stage_type,
                            fault,
                        });
                    }
                    recorded
                }
            };

            // History keeps the spawn list for auditing.
            let spawned = outcome.spawned.clone();
            info!(
                envelope_id = %envelope_id,
                stage = %stage_type,
                status = ?outcome.status,
                spawned = spawned.len(),
                "stage finished"
            );
            self.state.record(HistoryEntry {
                envelope_id,
                stage_type,
                outcome,
                started_at,
                finished_at,
            });

            for child in spawned {
                let child_id = child.id();
                if !self.state.enqueue(child) {
                    error!(envelope_id = %child_id, "duplicate envelope id dropped");
                }
            }

            let level = self.state.ledgers.budget.level();
            if self.state.ledgers.budget.is_critical(self.config.critical_budget)
                && !self.state.queue.is_empty()
            {
                warn!(
                    budget = level,
                    critical = self.config.critical_budget,
                    cooldown_ms = self.config.cooldown_ms,
                    "budget critical, cooling down"
                );
                tokio::time::sleep(self.config.cooldown()).await;
                self.state.cooldowns += 1;
            }
        }

        let report = self.report();
        info!(
            status = ?report.status,
            executed = report.executed,
            cooldowns = report.cooldowns,
            budget = report.budget_level,
            "run finished"
        );
        Ok(report)
    }

    /// Commit a snapshot before `envelope` runs and log it. Best effort.
    async fn checkpoint(&mut self, envelope: &TaskEnvelope) {
        let Some(store) = self.caps.snapshots.clone() else {
            return;
        };
        let message = format!("before {} {}", envelope.stage_type(), envelope.id());
        match store.commit(&message).await {
            Ok(snapshot_id) => {
                let entry = CheckpointEntry {
                    snapshot_id,
                    timestamp: self.clock.now(),
                    agent_id: envelope.stage_type().to_string(),
                    message,
                };
                if let Err(e) = self.state.ledgers.checkpoints.append(entry) {
                    warn!(error = %e, "checkpoint not recorded");
                }
            }
            Err(e) => warn!(error = %e, envelope_id = %envelope.id(), "checkpoint commit failed"),
        }
    }
}
