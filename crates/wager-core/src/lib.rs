//! wager-core
//!
//! Dynamic pipeline conductor for a value-bet forecaster.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, stage_type, envelope, outcome, records, errors）
//! - **config**: 予算・閾値・配線の設定
//! - **ports**: 抽象化レイヤー（OddsSource, ModelFactory, DatasetStore, sinks, Clock, など）
//! - **ledger**: ラン中に共有される台帳（model registry, performance, predictions, checkpoints, budget）
//! - **stages**: 各ステージの実装と StageRegistry
//! - **conductor**: FIFO キューを回すランループ
//! - **observability**: outcome の集計
//! - **impls**: 実装（ファイル / インメモリ / ロジスティック回帰 / ログ出力）

pub mod conductor;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ledger;
pub mod observability;
pub mod ports;
pub mod stages;

#[cfg(test)]
mod testing;

pub use conductor::{Conductor, HistoryEntry, RunReport, RunStatus};
pub use config::{FaultPolicy, PipelineConfig, Platform};
pub use domain::{ConductorError, Outcome, StageError, StageType, TaskEnvelope};
pub use stages::{Stage, StageRegistry};
