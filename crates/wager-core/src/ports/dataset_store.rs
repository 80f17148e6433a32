//! DatasetStore port - 保存済みデータセットの読み出し
//!
//! - historical: ソース別のキャッシュ（collector の代替経路）
//! - latest processed: 予測対象の最新 feature 行
//! - training data: ラベル付きの学習用 feature 行

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{FeatureRow, MatchRecord};

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("dataset not found: {0}")]
    NotFound(String),

    #[error("dataset {name} is corrupt: {reason}")]
    Corrupt { name: String, reason: String },
}

#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn load_historical(&self, source: &str) -> Result<Vec<MatchRecord>, StoreError>;

    async fn load_latest_processed(&self) -> Result<Vec<FeatureRow>, StoreError>;

    async fn load_training_data(&self) -> Result<Vec<FeatureRow>, StoreError>;
}
