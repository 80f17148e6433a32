//! OddsSource port - ブックメーカーのオッズ取得
//!
//! 実装は HTTP API でもファイルでもよい。ステージは名前でしか区別しない。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::MatchRecord;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("source {name} unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("source {name} returned malformed data: {reason}")]
    Malformed { name: String, reason: String },

    #[error("no odds source named {0}")]
    UnknownSource(String),
}

/// One bookmaker feed.
#[async_trait]
pub trait OddsSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch current fixtures and odds for `market`.
    async fn fetch(&self, market: &str) -> Result<Vec<MatchRecord>, FetchError>;
}
