//! Model registry: name -> trained model, with a short history per name.
//!
//! Design:
//! - `register` is last-write-wins; the newest entry is what `get` returns.
//! - Older entries are kept (bounded) so `best` can pick by accuracy.
//! - Handles are `Arc`, so a reader holding the previous model is unaffected
//!   by a later overwrite.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::LedgerError;
use crate::ports::TrainableModel;

pub type ModelHandle = Arc<dyn TrainableModel>;

#[derive(Clone)]
pub struct ModelEntry {
    pub handle: ModelHandle,
    pub model_type: String,
    /// Id of the envelope that trained this model.
    pub version: String,
    pub accuracy: Option<f64>,
    pub registered_at: DateTime<Utc>,
}

impl fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEntry")
            .field("model_type", &self.model_type)
            .field("version", &self.version)
            .field("accuracy", &self.accuracy)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}

pub struct ModelRegistry {
    entries: HashMap<String, VecDeque<ModelEntry>>,
    history_limit: usize,
}

impl ModelRegistry {
    pub fn new(history_limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            history_limit: history_limit.max(1),
        }
    }

    /// Register `entry` as the current model for `name`.
    pub fn register(&mut self, name: impl Into<String>, entry: ModelEntry) {
        let history = self.entries.entry(name.into()).or_default();
        history.push_back(entry);
        while history.len() > self.history_limit {
            history.pop_front();
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.get(name).and_then(|h| h.back())
    }

    pub fn require(&self, name: &str) -> Result<&ModelEntry, LedgerError> {
        self.get(name)
            .ok_or_else(|| LedgerError::ModelUnavailable(name.to_string()))
    }

    /// The retained entry with the highest recorded accuracy.
    pub fn best(&self, name: &str) -> Option<&ModelEntry> {
        self.entries
            .get(name)?
            .iter()
            .filter(|e| e.accuracy.is_some())
            .max_by(|a, b| {
                let (a, b) = (a.accuracy.unwrap_or(0.0), b.accuracy.unwrap_or(0.0));
                a.total_cmp(&b)
            })
    }

    pub fn history(&self, name: &str) -> impl Iterator<Item = &ModelEntry> {
        self.entries.get(name).into_iter().flat_map(|h| h.iter())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}
