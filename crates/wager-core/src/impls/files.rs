//! JSON-file port implementations rooted at a data directory.
//!
//! Layout:
//! - `{root}/{source}_historical.json`  cached `MatchRecord`s per source
//! - `{root}/latest_processed.json`     `FeatureRow`s to predict
//! - `{root}/training_data.json`        labelled `FeatureRow`s
//! - `{root}/odds/{source}.json`        current `MatchRecord`s with odds
//! - `{root}/results.json`              match_id -> `MatchResult`
//!
//! Source names are lower-cased in file names.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::domain::{FeatureRow, MatchRecord, MatchResult};
use crate::ports::{DatasetStore, FetchError, OddsSource, ResultSource, StoreError};

#[derive(Debug)]
enum ReadError {
    Missing,
    Io(String),
    Parse(String),
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ReadError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ReadError::Missing
        } else {
            ReadError::Io(e.to_string())
        }
    })?;
    serde_json::from_str(&content).map_err(|e| ReadError::Parse(e.to_string()))
}

fn store_error(name: &str, e: ReadError) -> StoreError {
    match e {
        ReadError::Missing => StoreError::NotFound(name.to_string()),
        ReadError::Io(reason) | ReadError::Parse(reason) => StoreError::Corrupt {
            name: name.to_string(),
            reason,
        },
    }
}

fn fetch_error(name: &str, e: ReadError) -> FetchError {
    match e {
        ReadError::Missing => FetchError::Unavailable {
            name: name.to_string(),
            reason: "no data file".to_string(),
        },
        ReadError::Io(reason) => FetchError::Unavailable {
            name: name.to_string(),
            reason,
        },
        ReadError::Parse(reason) => FetchError::Malformed {
            name: name.to_string(),
            reason,
        },
    }
}

#[derive(Debug, Clone)]
pub struct FileDatasetStore {
    root: PathBuf,
}

impl FileDatasetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T, StoreError> {
        read_json(&self.root.join(format!("{name}.json")))
            .await
            .map_err(|e| store_error(name, e))
    }
}

#[async_trait]
impl DatasetStore for FileDatasetStore {
    async fn load_historical(&self, source: &str) -> Result<Vec<MatchRecord>, StoreError> {
        self.load(&format!("{}_historical", source.to_lowercase()))
            .await
    }

    async fn load_latest_processed(&self) -> Result<Vec<FeatureRow>, StoreError> {
        self.load("latest_processed").await
    }

    async fn load_training_data(&self) -> Result<Vec<FeatureRow>, StoreError> {
        self.load("training_data").await
    }
}

/// Reads `{root}/odds/{name}.json` on every fetch.
#[derive(Debug, Clone)]
pub struct FileOddsSource {
    name: String,
    path: PathBuf,
}

impl FileOddsSource {
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Self {
        let name = name.into();
        let path = root
            .as_ref()
            .join("odds")
            .join(format!("{}.json", name.to_lowercase()));
        Self { name, path }
    }
}

#[async_trait]
impl OddsSource for FileOddsSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _market: &str) -> Result<Vec<MatchRecord>, FetchError> {
        read_json(&self.path)
            .await
            .map_err(|e| fetch_error(&self.name, e))
    }
}

#[derive(Debug, Clone)]
pub struct FileResultSource {
    path: PathBuf,
}

impl FileResultSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join("results.json"),
        }
    }
}

#[async_trait]
impl ResultSource for FileResultSource {
    async fn fetch_results(
        &self,
        match_ids: &[String],
    ) -> Result<HashMap<String, MatchResult>, FetchError> {
        let mut all: HashMap<String, MatchResult> = read_json(&self.path)
            .await
            .map_err(|e| fetch_error("results", e))?;
        Ok(match_ids
            .iter()
            .filter_map(|id| all.remove_entry(id))
            .collect())
    }
}
