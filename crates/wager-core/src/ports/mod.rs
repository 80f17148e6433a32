//! Ports - 外部依存の抽象化レイヤー
//!
//! ステージが触れる外部システム（オッズ提供元、データセット、モデル、
//! 通知先、スナップショット保存先）はすべてここの trait 越しに扱います。
//! 実装は `impls` にあり、テストでは差し替え可能です。
//!
//! Design:
//! - どの port も `Send + Sync`（`Arc` で共有される）
//! - 失敗は port ごとのエラー型で返し、ステージ側で Outcome に変換する
//! - `Capabilities` はランごとに一度だけ組み立て、実行中は読み取り専用

pub mod clock;
pub mod dataset_store;
pub mod id_generator;
pub mod model;
pub mod odds_source;
pub mod result_source;
pub mod sinks;
pub mod snapshot_store;

use std::sync::Arc;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::dataset_store::{DatasetStore, StoreError};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::model::{ModelError, ModelFactory, TrainableModel};
pub use self::odds_source::{FetchError, OddsSource};
pub use self::result_source::ResultSource;
pub use self::sinks::{DashboardSink, NotificationSink, SinkError};
pub use self::snapshot_store::{SnapshotError, SnapshotStore};

/// Everything a stage may reach outside the process.
///
/// Odds sources and the model factory are mandatory; the rest are optional
/// and stages degrade (warn and skip) when one is missing.
#[derive(Clone)]
pub struct Capabilities {
    pub odds_sources: Vec<Arc<dyn OddsSource>>,
    pub models: Arc<dyn ModelFactory>,
    pub datasets: Arc<dyn DatasetStore>,
    pub results: Option<Arc<dyn ResultSource>>,
    pub notifier: Option<Arc<dyn NotificationSink>>,
    pub dashboard: Option<Arc<dyn DashboardSink>>,
    pub snapshots: Option<Arc<dyn SnapshotStore>>,
}

impl Capabilities {
    pub fn new(models: Arc<dyn ModelFactory>, datasets: Arc<dyn DatasetStore>) -> Self {
        Self {
            odds_sources: Vec::new(),
            models,
            datasets,
            results: None,
            notifier: None,
            dashboard: None,
            snapshots: None,
        }
    }

    pub fn with_odds_source(mut self, source: Arc<dyn OddsSource>) -> Self {
        self.odds_sources.push(source);
        self
    }

    pub fn with_results(mut self, results: Arc<dyn ResultSource>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_dashboard(mut self, dashboard: Arc<dyn DashboardSink>) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    pub fn with_snapshots(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Look up an odds source by name (case-insensitive).
    pub fn odds_source(&self, name: &str) -> Option<&Arc<dyn OddsSource>> {
        self.odds_sources
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }
}
