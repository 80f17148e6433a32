//! Checkpoint log: snapshot ids committed before each envelope runs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LedgerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub snapshot_id: String,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct CheckpointLog {
    entries: Vec<CheckpointEntry>,
    by_id: HashMap<String, usize>,
}

impl CheckpointLog {
    pub fn append(&mut self, entry: CheckpointEntry) -> Result<(), LedgerError> {
        if self.by_id.contains_key(&entry.snapshot_id) {
            return Err(LedgerError::DuplicateSnapshot(entry.snapshot_id));
        }
        self.by_id
            .insert(entry.snapshot_id.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, snapshot_id: &str) -> Option<&CheckpointEntry> {
        self.by_id.get(snapshot_id).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[CheckpointEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
