use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::atomic_io::write_atomic;

pub const MAX_RANKED_RESULTS: usize = 10;
pub const RANKED_RESULTS_FILE: &str = "ranked_results.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedResult {
    pub initials: String,
    pub score: u32,
}

impl RankedResult {
    pub fn new(initials: impl Into<String>, score: u32) -> Self {
        Self {
            initials: initials.into(),
            score,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScoreStoreError {
    #[error("failed to read ranked results {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse ranked results {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode ranked results: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write ranked results {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ranked results store is unavailable: {0}")]
    Unavailable(String),
}

/// Externally owned top-10 table. Implementations return entries sorted by descending score.
pub trait RankedResultsStore {
    fn load_ranked_results(&self) -> Result<Vec<RankedResult>, ScoreStoreError>;
    fn save_ranked_results(&mut self, results: &[RankedResult]) -> Result<(), ScoreStoreError>;
}

/// Sorts by descending score (stable for ties) and keeps the top entries.
pub fn normalize_ranked(mut results: Vec<RankedResult>) -> Vec<RankedResult> {
    results.sort_by(|a, b| b.score.cmp(&a.score));
    results.truncate(MAX_RANKED_RESULTS);
    results
}

pub fn qualifies(results: &[RankedResult], score: u32) -> bool {
    if score == 0 {
        return false;
    }
    if results.len() < MAX_RANKED_RESULTS {
        return true;
    }
    results.last().map_or(true, |lowest| score > lowest.score)
}

/// Inserts below any equal scores already present and returns the 1-based rank, or `None`
/// when the entry falls off the table.
pub fn insert_ranked(results: &mut Vec<RankedResult>, entry: RankedResult) -> Option<usize> {
    let position = results
        .iter()
        .position(|existing| existing.score < entry.score)
        .unwrap_or(results.len());
    if position >= MAX_RANKED_RESULTS {
        return None;
    }
    results.insert(position, entry);
    results.truncate(MAX_RANKED_RESULTS);
    Some(position + 1)
}

/// JSON array on disk, replaced atomically on save. A missing file reads as empty and
/// malformed entries are dropped one by one.
#[derive(Debug, Clone)]
pub struct JsonFileResultsStore {
    path: PathBuf,
}

impl JsonFileResultsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_cache_dir(cache_dir: &Path) -> Self {
        Self::new(cache_dir.join(RANKED_RESULTS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RankedResultsStore for JsonFileResultsStore {
    fn load_ranked_results(&self) -> Result<Vec<RankedResult>, ScoreStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ScoreStoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let entries: Vec<serde_json::Value> =
            serde_json::from_str(&raw).map_err(|source| ScoreStoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        let total = entries.len();
        let results = entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<RankedResult>(entry).ok())
            .collect::<Vec<_>>();
        if results.len() < total {
            warn!(
                path = %self.path.display(),
                skipped = total - results.len(),
                "ranked_results_entries_skipped"
            );
        }
        Ok(normalize_ranked(results))
    }

    fn save_ranked_results(&mut self, results: &[RankedResult]) -> Result<(), ScoreStoreError> {
        let cleaned = normalize_ranked(results.to_vec());
        let json = serde_json::to_string_pretty(&cleaned).map_err(ScoreStoreError::Encode)?;
        write_atomic(&self.path, json.as_bytes()).map_err(|source| ScoreStoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Process-local table. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResultsStore {
    results: Arc<Mutex<Vec<RankedResult>>>,
}

impl InMemoryResultsStore {
    pub fn with_results(results: Vec<RankedResult>) -> Self {
        Self {
            results: Arc::new(Mutex::new(normalize_ranked(results))),
        }
    }

    pub fn results(&self) -> Vec<RankedResult> {
        match self.results.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RankedResultsStore for InMemoryResultsStore {
    fn load_ranked_results(&self) -> Result<Vec<RankedResult>, ScoreStoreError> {
        Ok(self.results())
    }

    fn save_ranked_results(&mut self, results: &[RankedResult]) -> Result<(), ScoreStoreError> {
        let cleaned = normalize_ranked(results.to_vec());
        match self.results.lock() {
            Ok(mut guard) => *guard = cleaned,
            Err(poisoned) => *poisoned.into_inner() = cleaned,
        }
        Ok(())
    }
}
