//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **memory**: 固定データ・インメモリ実装（テスト・デモ用）
//! - **files**: JSON ファイルを読む odds source / dataset store / result source
//! - **log_sink**: tracing に出力するレポート配信先
//! - **logistic**: ロジスティック回帰のベースラインモデルと factory
//!
//! CLI はこれらだけで外部サービスなしに end-to-end で動きます。

pub mod files;
pub mod log_sink;
pub mod logistic;
pub mod memory;

pub use self::files::{FileDatasetStore, FileOddsSource, FileResultSource};
pub use self::log_sink::{LogSink, render_text};
pub use self::logistic::{LogisticFactory, LogisticModel};
pub use self::memory::{
    InMemoryDashboard, InMemoryDatasetStore, InMemorySnapshotStore, StaticOddsSource,
    StaticResultSource,
};
