//! ResultSource port - 試合結果の取得（予測の検証用）

use std::collections::HashMap;

use async_trait::async_trait;

use super::odds_source::FetchError;
use crate::domain::MatchResult;

#[async_trait]
pub trait ResultSource: Send + Sync {
    /// Results for whichever of `match_ids` have finished. Unknown or
    /// unfinished ids are simply absent from the map.
    async fn fetch_results(
        &self,
        match_ids: &[String],
    ) -> Result<HashMap<String, MatchResult>, FetchError>;
}
