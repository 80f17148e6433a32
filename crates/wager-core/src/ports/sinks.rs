//! Report sinks - レポートの配信先
//!
//! 配信失敗はランを止めない（reporter が warn して次へ進む）。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Report;

#[derive(Debug, Error)]
#[error("delivery to {target} failed: {reason}")]
pub struct SinkError {
    pub target: String,
    pub reason: String,
}

impl SinkError {
    pub fn new(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Chat-style notification channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, report: &Report) -> Result<(), SinkError>;
}

#[async_trait]
pub trait DashboardSink: Send + Sync {
    async fn publish(&self, report: &Report) -> Result<(), SinkError>;
}
