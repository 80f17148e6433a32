//! TaskEnvelope - one immutable unit of work.
//!
//! The envelope itself is untyped (`stage_type` + an ordered JSON map) so the
//! queue and history can hold every kind of work uniformly. Stages read and
//! write it through the typed `StageInput` trait.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::errors::StageError;
use super::ids::EnvelopeId;
use super::stage_type::StageType;

/// Ordered key -> value parameters of an envelope.
pub type Spec = serde_json::Map<String, serde_json::Value>;

/// Stage type + spec + id, created once and consumed exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    id: EnvelopeId,
    stage_type: StageType,
    spec: Spec,
}

impl TaskEnvelope {
    pub fn new(id: EnvelopeId, stage_type: StageType, spec: Spec) -> Self {
        Self {
            id,
            stage_type,
            spec,
        }
    }

    pub fn id(&self) -> EnvelopeId {
        self.id
    }

    pub fn stage_type(&self) -> StageType {
        self.stage_type
    }

    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    /// Decode the spec into the typed input of the stage that owns it.
    pub fn decode<T: StageInput>(&self) -> Result<T, StageError> {
        if self.stage_type != T::STAGE {
            return Err(StageError::Decode {
                stage: T::STAGE,
                reason: format!("envelope carries stage_type={}", self.stage_type),
            });
        }
        serde_json::from_value(serde_json::Value::Object(self.spec.clone())).map_err(|e| {
            StageError::Decode {
                stage: T::STAGE,
                reason: e.to_string(),
            }
        })
    }
}

/// Associates a typed input with the stage type that consumes it.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct RepairInput { source: String, error: String }
///
/// impl StageInput for RepairInput {
///     const STAGE: StageType = StageType::Repair;
/// }
/// ```
pub trait StageInput: Serialize + DeserializeOwned + Send + Sync + 'static {
    const STAGE: StageType;

    fn to_spec(&self) -> Result<Spec, StageError> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(other) => Err(StageError::Encode {
                stage: Self::STAGE,
                reason: format!("expected an object, got {other}"),
            }),
            Err(e) => Err(StageError::Encode {
                stage: Self::STAGE,
                reason: e.to_string(),
            }),
        }
    }
}
