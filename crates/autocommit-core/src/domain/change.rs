//! Triggers and changesets.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which producer requested an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Filesystem,
    Timer,
    /// A one-shot request from the CLI (`--once`).
    Manual,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Filesystem => "filesystem",
            TriggerSource::Timer => "timer",
            TriggerSource::Manual => "manual",
        }
    }
}

/// A request for one commit attempt. Consumed once, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub source: TriggerSource,
    pub timestamp: DateTime<Utc>,
    pub path: Option<PathBuf>,
}

impl Trigger {
    pub fn timer() -> Self {
        Self {
            source: TriggerSource::Timer,
            timestamp: Utc::now(),
            path: None,
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>) -> Self {
        Self {
            source: TriggerSource::Filesystem,
            timestamp: Utc::now(),
            path: Some(path.into()),
        }
    }

    pub fn manual() -> Self {
        Self {
            source: TriggerSource::Manual,
            timestamp: Utc::now(),
            path: None,
        }
    }
}

/// The dirty and untracked paths of the working tree at attempt time.
///
/// Paths are repository-relative as git reports them. Deduplicated; iteration
/// order is sorted so scans over the same set are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    paths: BTreeSet<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.paths.insert(path.into())
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}
