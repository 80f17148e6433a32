//! Collector: pull fixtures and odds from every configured source.
//!
//! A failing source never fails the stage. Its cached historical dataset is
//! used instead when one exists, and a Repair envelope is spawned either way.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::feature_engineer::FeatureEngineerInput;
use super::maintenance::RepairInput;
use super::{Stage, StageContext};
use crate::domain::{MatchRecord, Outcome, StageError, StageInput, StageType, TaskEnvelope};
use crate::ports::FetchError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorInput {
    /// Override the configured source list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

impl StageInput for CollectorInput {
    const STAGE: StageType = StageType::Collector;
}

pub struct Collector;

#[async_trait]
impl Stage for Collector {
    fn stage_type(&self) -> StageType {
        StageType::Collector
    }

    async fn execute(
        &self,
        envelope: &TaskEnvelope,
        ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        let input: CollectorInput = envelope.decode()?;
        let sources = input.sources.unwrap_or_else(|| ctx.config.sources.clone());

        let mut records: Vec<MatchRecord> = Vec::new();
        let mut repairs = Vec::new();
        let mut sources_ok = Vec::new();
        let mut sources_failed = Vec::new();
        let mut cost = 0.0;

        for name in &sources {
            let fetched = match ctx.caps.odds_source(name) {
                Some(source) => source.fetch(&ctx.config.market).await,
                None => Err(FetchError::UnknownSource(name.clone())),
            };

            match fetched {
                Ok(batch) => {
                    let charge = ctx.config.cost_per_record * batch.len() as f64;
                    ctx.ledgers.budget.charge(charge)?;
                    cost += charge;
                    info!(source = %name, records = batch.len(), charge, "collected odds");
                    sources_ok.push(name.clone());
                    records.extend(batch);
                }
                Err(e) => {
                    warn!(source = %name, error = %e, "odds fetch failed, trying cached dataset");
                    match ctx.caps.datasets.load_historical(name).await {
                        Ok(cached) => {
                            info!(source = %name, records = cached.len(), "using cached dataset");
                            records.extend(cached);
                        }
                        Err(cache_err) => {
                            warn!(source = %name, error = %cache_err, "no cached dataset");
                        }
                    }
                    sources_failed.push(name.clone());
                    repairs.push(ctx.spawn(&RepairInput {
                        source: name.clone(),
                        error: e.to_string(),
                    })?);
                }
            }
        }

        let data_points = records.len();
        let next = ctx.spawn(&FeatureEngineerInput { records })?;

        Ok(Outcome::success()
            .with("data_points", data_points)
            .with("sources_ok", sources_ok)
            .with("sources_failed", sources_failed)
            .with("cost", cost)
            .spawn_all(repairs)
            .spawn(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::impls::{InMemoryDatasetStore, StaticOddsSource};
    use crate::testing::{TestHarness, records};

    #[tokio::test]
    async fn failing_source_spawns_repair_and_keeps_good_records() {
        let mut h = TestHarness::new();
        h.caps = h
            .caps
            .clone()
            .with_odds_source(Arc::new(StaticOddsSource::new("A", records(10))))
            .with_odds_source(Arc::new(StaticOddsSource::failing("B", "timeout")));
        h.config.sources = vec!["A".to_string(), "B".to_string()];

        let env = h.envelope(&CollectorInput::default());
        let out = h.run(&Collector, &env).await.unwrap();

        assert_eq!(out.payload["data_points"], 10);
        let spawned: Vec<_> = out.spawned.iter().map(|e| e.stage_type()).collect();
        assert_eq!(spawned, vec![StageType::Repair, StageType::FeatureEngineer]);

        let repair: RepairInput = out.spawned[0].decode().unwrap();
        assert_eq!(repair.source, "B");
        assert!(repair.error.contains("timeout"));

        let fe: FeatureEngineerInput = out.spawned[1].decode().unwrap();
        assert_eq!(fe.records.len(), 10);
    }

    #[tokio::test]
    async fn records_are_charged_to_the_budget() {
        let mut h = TestHarness::new();
        h.caps = h
            .caps
            .clone()
            .with_odds_source(Arc::new(StaticOddsSource::new("A", records(10))));
        h.config.sources = vec!["A".to_string()];
        h.config.cost_per_record = 1.0;

        let env = h.envelope(&CollectorInput::default());
        h.run(&Collector, &env).await.unwrap();

        assert_eq!(h.ledgers.budget.level(), h.config.initial_budget - 10.0);
    }

    #[tokio::test]
    async fn cached_dataset_replaces_failed_fetch() {
        let mut h = TestHarness::new();
        h.caps.datasets =
            Arc::new(InMemoryDatasetStore::default().with_historical("B", records(4)));
        h.caps = h
            .caps
            .clone()
            .with_odds_source(Arc::new(StaticOddsSource::failing("B", "503")));
        h.config.sources = vec!["B".to_string()];

        let env = h.envelope(&CollectorInput::default());
        let out = h.run(&Collector, &env).await.unwrap();

        assert_eq!(out.payload["data_points"], 4);
        // Repair is spawned even though the cache covered the gap.
        assert_eq!(out.spawned[0].stage_type(), StageType::Repair);
        assert_eq!(h.ledgers.budget.level(), h.config.initial_budget);
    }

    #[tokio::test]
    async fn unknown_source_is_treated_as_a_failure() {
        let mut h = TestHarness::new();
        h.config.sources = vec!["Nowhere".to_string()];

        let env = h.envelope(&CollectorInput::default());
        let out = h.run(&Collector, &env).await.unwrap();

        assert_eq!(out.payload["data_points"], 0);
        assert_eq!(out.payload["sources_failed"], serde_json::json!(["Nowhere"]));
        assert_eq!(out.spawned.len(), 2);
    }
}
