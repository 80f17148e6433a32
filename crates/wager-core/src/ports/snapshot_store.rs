//! SnapshotStore port - 実行前チェックポイントの保存先
//!
//! conductor は各 envelope の実行前に commit し、返された ID を
//! checkpoint ledger に記録します。失敗してもランは続行します。

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("snapshot commit failed: {0}")]
pub struct SnapshotError(pub String);

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Commit the current state; returns the snapshot id.
    async fn commit(&self, message: &str) -> Result<String, SnapshotError>;
}
