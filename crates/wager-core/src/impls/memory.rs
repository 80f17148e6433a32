//! In-memory port implementations backed by fixed data.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{FeatureRow, MatchRecord, MatchResult, Report};
use crate::ports::{
    DashboardSink, DatasetStore, FetchError, IdGenerator, OddsSource, ResultSource, SinkError,
    SnapshotError, SnapshotStore, StoreError, SystemClock, UlidGenerator,
};

/// Odds source that always returns the same records, or always fails.
pub struct StaticOddsSource {
    name: String,
    response: Result<Vec<MatchRecord>, String>,
}

impl StaticOddsSource {
    pub fn new(name: impl Into<String>, records: Vec<MatchRecord>) -> Self {
        Self {
            name: name.into(),
            response: Ok(records),
        }
    }

    pub fn failing(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: Err(reason.into()),
        }
    }
}

#[async_trait]
impl OddsSource for StaticOddsSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _market: &str) -> Result<Vec<MatchRecord>, FetchError> {
        self.response.clone().map_err(|reason| FetchError::Unavailable {
            name: self.name.clone(),
            reason,
        })
    }
}

/// Dataset store holding everything in memory. Historical datasets are
/// keyed by lower-cased source name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatasetStore {
    historical: HashMap<String, Vec<MatchRecord>>,
    latest: Option<Vec<FeatureRow>>,
    training: Option<Vec<FeatureRow>>,
}

impl InMemoryDatasetStore {
    pub fn with_historical(mut self, source: &str, records: Vec<MatchRecord>) -> Self {
        self.historical.insert(source.to_lowercase(), records);
        self
    }

    pub fn with_latest(mut self, rows: Vec<FeatureRow>) -> Self {
        self.latest = Some(rows);
        self
    }

    pub fn with_training(mut self, rows: Vec<FeatureRow>) -> Self {
        self.training = Some(rows);
        self
    }
}

#[async_trait]
impl DatasetStore for InMemoryDatasetStore {
    async fn load_historical(&self, source: &str) -> Result<Vec<MatchRecord>, StoreError> {
        let key = source.to_lowercase();
        self.historical
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{key}_historical")))
    }

    async fn load_latest_processed(&self) -> Result<Vec<FeatureRow>, StoreError> {
        self.latest
            .clone()
            .ok_or_else(|| StoreError::NotFound("latest_processed".to_string()))
    }

    async fn load_training_data(&self) -> Result<Vec<FeatureRow>, StoreError> {
        self.training
            .clone()
            .ok_or_else(|| StoreError::NotFound("training_data".to_string()))
    }
}

pub struct StaticResultSource {
    results: HashMap<String, MatchResult>,
}

impl StaticResultSource {
    pub fn new(results: HashMap<String, MatchResult>) -> Self {
        Self { results }
    }
}

#[async_trait]
impl ResultSource for StaticResultSource {
    async fn fetch_results(
        &self,
        match_ids: &[String],
    ) -> Result<HashMap<String, MatchResult>, FetchError> {
        Ok(match_ids
            .iter()
            .filter_map(|id| self.results.get(id).map(|r| (id.clone(), *r)))
            .collect())
    }
}

/// Records commit messages; snapshot ids come from the id generator.
pub struct InMemorySnapshotStore {
    ids: Box<dyn IdGenerator>,
    commits: Mutex<Vec<(String, String)>>,
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::with_ids(UlidGenerator::new(SystemClock))
    }
}

impl InMemorySnapshotStore {
    pub fn with_ids(ids: impl IdGenerator + 'static) -> Self {
        Self {
            ids: Box::new(ids),
            commits: Mutex::new(Vec::new()),
        }
    }

    /// `(snapshot_id, message)` pairs in commit order.
    pub fn commits(&self) -> Vec<(String, String)> {
        self.commits.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn commit(&self, message: &str) -> Result<String, SnapshotError> {
        let id = self.ids.generate_snapshot_id().to_string();
        let mut commits = self
            .commits
            .lock()
            .map_err(|_| SnapshotError("snapshot store lock poisoned".to_string()))?;
        commits.push((id.clone(), message.to_string()));
        Ok(id)
    }
}

/// Dashboard that keeps every published report.
#[derive(Default)]
pub struct InMemoryDashboard {
    published: Mutex<Vec<Report>>,
}

impl InMemoryDashboard {
    pub fn published(&self) -> Vec<Report> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DashboardSink for InMemoryDashboard {
    async fn publish(&self, report: &Report) -> Result<(), SinkError> {
        self.published
            .lock()
            .map_err(|_| SinkError::new("dashboard", "lock poisoned"))?
            .push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn historical_lookup_ignores_case() {
        let store = InMemoryDatasetStore::default()
            .with_historical("Betway", vec![MatchRecord::new("1", "A", "B")]);

        assert_eq!(store.load_historical("betway").await.unwrap().len(), 1);
        assert_eq!(
            store.load_historical("Hollywoodbets").await.unwrap_err(),
            StoreError::NotFound("hollywoodbets_historical".to_string())
        );
    }

    #[tokio::test]
    async fn snapshot_ids_are_unique() {
        let store = InMemorySnapshotStore::default();
        let a = store.commit("before collector").await.unwrap();
        let b = store.commit("before trainer").await.unwrap();

        assert_ne!(a, b);
        assert!(a.starts_with("snap-"));
        assert_eq!(store.commits().len(), 2);
    }

    #[tokio::test]
    async fn snapshot_ids_follow_the_generator_clock() {
        use crate::ports::FixedClock;
        use chrono::{TimeZone, Utc};

        let at = Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap();
        let store = InMemorySnapshotStore::with_ids(UlidGenerator::new(FixedClock::new(at)));
        let id = store.commit("before predictor").await.unwrap();

        let ulid: ulid::Ulid = id.trim_start_matches("snap-").parse().unwrap();
        assert_eq!(ulid.timestamp_ms(), at.timestamp_millis() as u64);
        assert_eq!(store.commits(), vec![(id, "before predictor".to_string())]);
    }
}
