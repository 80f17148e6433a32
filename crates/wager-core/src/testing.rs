//! Shared fakes for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::config::PipelineConfig;
use crate::domain::{
    FeatureRow, Features, MatchRecord, Outcome, Report, Spec, StageError, StageInput, StageType,
    TaskEnvelope,
};
use crate::impls::InMemoryDatasetStore;
use crate::ledger::{Ledgers, ModelEntry};
use crate::ports::{
    Capabilities, Clock, FixedClock, IdGenerator, ModelError, ModelFactory, NotificationSink,
    SinkError, TrainableModel, UlidGenerator,
};
use crate::stages::{Stage, StageContext};

/// Model with a fixed training accuracy and a constant probability.
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    accuracy: f64,
    probability: f64,
}

impl ScriptedModel {
    pub fn constant(probability: f64) -> Self {
        Self {
            accuracy: 0.8,
            probability,
        }
    }
}

#[async_trait]
impl TrainableModel for ScriptedModel {
    async fn train(&mut self, rows: &[FeatureRow], _target: &str) -> Result<f64, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::InsufficientData {
                rows: 0,
                required: 1,
            });
        }
        Ok(self.accuracy)
    }

    async fn predict(&self, features: &[Features]) -> Result<Vec<f64>, ModelError> {
        Ok(vec![self.probability; features.len()])
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    accuracy: f64,
    probability: f64,
}

impl Default for ScriptedFactory {
    fn default() -> Self {
        Self {
            accuracy: 0.8,
            probability: 0.5,
        }
    }
}

impl ScriptedFactory {
    pub fn with_accuracy(accuracy: f64) -> Self {
        Self {
            accuracy,
            ..Self::default()
        }
    }

    pub fn with_probability(probability: f64) -> Self {
        Self {
            probability,
            ..Self::default()
        }
    }

    pub fn probability(mut self, probability: f64) -> Self {
        self.probability = probability;
        self
    }
}

impl ModelFactory for ScriptedFactory {
    fn build(&self, _model_type: &str) -> Result<Box<dyn TrainableModel>, ModelError> {
        Ok(Box::new(ScriptedModel {
            accuracy: self.accuracy,
            probability: self.probability,
        }))
    }
}

pub struct FailingNotifier;

#[async_trait]
impl NotificationSink for FailingNotifier {
    async fn send(&self, _report: &Report) -> Result<(), SinkError> {
        Err(SinkError::new("notification", "chat api unreachable"))
    }
}

/// `n` fixtures `m0..` with odds 2.5, alternating labels.
pub fn records(n: usize) -> Vec<MatchRecord> {
    (0..n)
        .map(|i| {
            let mut r = MatchRecord::new(format!("m{i}"), format!("Home {i}"), format!("Away {i}"));
            r.odds = Some(2.5);
            r.home_player_ratings = vec![6.5 + (i % 3) as f64];
            r.away_player_ratings = vec![6.8];
            r.pitch_rating = Some(7.5);
            r.outcome = Some(i % 2 == 0);
            r
        })
        .collect()
}

/// `n` feature rows `m0..`, alternating labels.
pub fn labelled_rows(n: usize) -> Vec<FeatureRow> {
    (0..n)
        .map(|i| FeatureRow {
            match_id: format!("m{i}"),
            home_team: format!("Home {i}"),
            away_team: format!("Away {i}"),
            features: Features {
                player_form: (i % 4) as f64 - 1.5,
                weather: 1.0,
                pitch_condition: 1.0,
                ..Features::default()
            },
            label: Some(i % 2 == 0),
        })
        .collect()
}

pub fn test_caps() -> Capabilities {
    Capabilities::new(
        Arc::new(ScriptedFactory::default()),
        Arc::new(InMemoryDatasetStore::default()),
    )
}

/// Runs a single stage against owned config, capabilities and ledgers.
pub struct TestHarness {
    pub config: PipelineConfig,
    pub caps: Capabilities,
    pub ledgers: Ledgers,
    pub clock: FixedClock,
    ids: UlidGenerator<FixedClock>,
}

impl TestHarness {
    pub fn new() -> Self {
        let config = PipelineConfig::default();
        let clock = FixedClock::new(Self::epoch());
        Self {
            ledgers: Ledgers::new(&config),
            caps: test_caps(),
            ids: UlidGenerator::new(clock),
            clock,
            config,
        }
    }

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0)
            .single()
            .unwrap_or_default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn envelope<T: StageInput>(&self, input: &T) -> TaskEnvelope {
        self.envelope_raw(T::STAGE, input.to_spec().unwrap())
    }

    pub fn envelope_raw(&self, stage_type: StageType, spec: Spec) -> TaskEnvelope {
        TaskEnvelope::new(self.ids.generate_envelope_id(), stage_type, spec)
    }

    /// Register a constant-probability model under the configured key.
    pub fn register_model(&mut self, probability: f64) {
        let key = self.config.model_key.clone();
        self.ledgers.models.register(
            key,
            ModelEntry {
                handle: Arc::new(ScriptedModel::constant(probability)),
                model_type: self.config.model_type.clone(),
                version: "test".to_string(),
                accuracy: Some(0.8),
                registered_at: self.now(),
            },
        );
    }

    pub async fn run<S: Stage + ?Sized>(
        &mut self,
        stage: &S,
        envelope: &TaskEnvelope,
    ) -> Result<Outcome, StageError> {
        let mut ctx = StageContext {
            envelope_id: envelope.id(),
            config: &self.config,
            caps: &self.caps,
            ledgers: &mut self.ledgers,
            ids: &self.ids,
            clock: &self.clock,
        };
        stage.execute(envelope, &mut ctx).await
    }
}

/// Spawns one empty envelope per listed child type.
pub struct SpawningStage {
    stage_type: StageType,
    children: Vec<StageType>,
}

impl SpawningStage {
    pub fn new(stage_type: StageType, children: Vec<StageType>) -> Self {
        Self {
            stage_type,
            children,
        }
    }
}

#[async_trait]
impl Stage for SpawningStage {
    fn stage_type(&self) -> StageType {
        self.stage_type
    }

    async fn execute(
        &self,
        _envelope: &TaskEnvelope,
        ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        let spawned = self
            .children
            .iter()
            .map(|&ty| ctx.spawn_raw(ty, Spec::new()));
        Ok(Outcome::success().spawn_all(spawned))
    }
}

/// Always returns a fault.
pub struct FaultingStage {
    stage_type: StageType,
}

impl FaultingStage {
    pub fn new(stage_type: StageType) -> Self {
        Self { stage_type }
    }
}

#[async_trait]
impl Stage for FaultingStage {
    fn stage_type(&self) -> StageType {
        self.stage_type
    }

    async fn execute(
        &self,
        _envelope: &TaskEnvelope,
        _ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        Err(StageError::Other("model backend crashed".to_string()))
    }
}

/// Charges a fixed amount, then behaves like `SpawningStage`.
pub struct ChargingStage {
    amount: f64,
    inner: SpawningStage,
}

impl ChargingStage {
    pub fn new(stage_type: StageType, amount: f64, children: Vec<StageType>) -> Self {
        Self {
            amount,
            inner: SpawningStage::new(stage_type, children),
        }
    }
}

#[async_trait]
impl Stage for ChargingStage {
    fn stage_type(&self) -> StageType {
        self.inner.stage_type
    }

    async fn execute(
        &self,
        envelope: &TaskEnvelope,
        ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        ctx.ledgers.budget.charge(self.amount)?;
        self.inner.execute(envelope, ctx).await
    }
}
