//! Outcome model: what a stage reports back to the conductor.
//!
//! The status and the spawn list are independent fields. A stage may report
//! `pending` and spawn a trainer, or `success` and spawn nothing; the
//! conductor never waits on spawned work.

use serde::{Deserialize, Serialize};

use super::envelope::{Spec, TaskEnvelope};
use super::errors::StageError;

/// Classification of a single stage execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Pending,
    Error,
    RetrainingTriggered,
    ModelReviewTriggered,
}

/// Result of one stage execution: status + payload + follow-up work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub payload: Spec,

    /// Envelopes to append to the queue tail, in this order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spawned: Vec<TaskEnvelope>,
}

impl Outcome {
    pub fn new(status: OutcomeStatus) -> Self {
        Self {
            status,
            payload: Spec::new(),
            spawned: Vec::new(),
        }
    }

    pub fn success() -> Self {
        Self::new(OutcomeStatus::Success)
    }

    pub fn pending() -> Self {
        Self::new(OutcomeStatus::Pending)
    }

    /// An error outcome with a human-readable `message` in the payload.
    pub fn error(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::new(OutcomeStatus::Error).with("message", message)
    }

    /// Error outcome recorded in place of a fault the stage failed to contain.
    pub fn fault(fault: &StageError) -> Self {
        Self::error(fault.to_string()).with("uncontained", true)
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn spawn(mut self, envelope: TaskEnvelope) -> Self {
        self.spawned.push(envelope);
        self
    }

    pub fn spawn_all(mut self, envelopes: impl IntoIterator<Item = TaskEnvelope>) -> Self {
        self.spawned.extend(envelopes);
        self
    }

    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(|v| v.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.status == OutcomeStatus::Error
    }
}
