//! Model port - 学習可能な確率モデル
//!
//! モデルは二値ラベル（market が成立したか）を予測し、`predict` は
//! 各行について `[0, 1]` の確率を返します。
//!
//! Design:
//! - `train` は `&mut self`（学習済みになったら `Arc` に包んで registry へ）
//! - `predict` は `&self`（registry から共有参照で呼ばれる）
//! - 生成は `ModelFactory` 経由（model_type 文字列で選ぶ）

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{FeatureRow, Features};

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("insufficient training data: {rows} labelled rows, need {required}")]
    InsufficientData { rows: usize, required: usize },

    #[error("unknown model type: {0}")]
    UnknownModelType(String),

    #[error("model expects {expected} features, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("model has not been trained")]
    NotTrained,

    #[error("training failed: {0}")]
    Training(String),
}

#[async_trait]
pub trait TrainableModel: Send + Sync {
    /// Fit on labelled rows; returns held-out accuracy in `[0, 1]`.
    async fn train(&mut self, rows: &[FeatureRow], target: &str) -> Result<f64, ModelError>;

    /// Probability per row, same order as `features`.
    async fn predict(&self, features: &[Features]) -> Result<Vec<f64>, ModelError>;
}

/// Builds untrained models by type name ("hybrid", "ensemble", ...).
pub trait ModelFactory: Send + Sync {
    fn build(&self, model_type: &str) -> Result<Box<dyn TrainableModel>, ModelError>;
}
