//! repository, chart and manifest entities with their lifecycle states.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::name::{RepoId, RepoName};

/// Lifecycle state of a repository, chart, manifest or version.
///
/// Declaration order is significant: the query evaluator compares states
/// through their ordinal, so new states must only ever be appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum State {
    Created,
    Error,
    Ready,
    Running,
    Complete,
    Failed,
    RolledBack,
    Deleting,
    Deleted,
    Purging,
    Purged,
}

impl State {
    /// stable numeric rank used by query comparisons
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }
}

impl Default for State {
    fn default() -> Self {
        State::Created
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            State::Created => "created",
            State::Error => "error",
            State::Ready => "ready",
            State::Running => "running",
            State::Complete => "complete",
            State::Failed => "failed",
            State::RolledBack => "rolled-back",
            State::Deleting => "deleting",
            State::Deleted => "deleted",
            State::Purging => "purging",
            State::Purged => "purged",
        };
        write!(f, "{}", label)
    }
}

/// a single version of a chart or manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub name: String,
    pub state: State,
}

/// a versioned chart stored inside a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chart {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub versions: Vec<Version>,
    pub state: State,
}

/// a versioned deployment manifest stored inside a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub versions: Vec<Version>,
    pub state: State,
}

/// items addressed by name within a repository collection
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Chart {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Manifest {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Drop later duplicates of a name, keeping the first occurrence.
///
/// Collection merges rely on ordering: existing items come first, so an
/// incoming item never displaces one already present under the same name.
pub fn dedupe_by_name<T: Named>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.name().to_string()))
        .collect()
}

/// A named container of charts and manifests.
///
/// One detail file plus two collection files on disk; reconstructed on
/// every read by merging the three, never cached across calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepoId,
    pub name: RepoName,
    #[serde(default)]
    pub charts: Vec<Chart>,
    #[serde(default)]
    pub manifests: Vec<Manifest>,
    pub state: State,
}

impl Repository {
    /// create an empty repository with the given identity and state
    pub fn new(id: RepoId, name: RepoName, state: State) -> Self {
        Self {
            id,
            name,
            charts: Vec::new(),
            manifests: Vec::new(),
            state,
        }
    }

    /// append incoming charts, deduplicating by name with existing first
    pub fn merge_charts(&mut self, incoming: Vec<Chart>) {
        let mut merged = std::mem::take(&mut self.charts);
        merged.extend(incoming);
        self.charts = dedupe_by_name(merged);
    }

    /// append incoming manifests, deduplicating by name with existing first
    pub fn merge_manifests(&mut self, incoming: Vec<Manifest>) {
        let mut merged = std::mem::take(&mut self.manifests);
        merged.extend(incoming);
        self.manifests = dedupe_by_name(merged);
    }
}

/// chart collection file content for one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartList {
    pub repository: RepoName,
    #[serde(default)]
    pub charts: Vec<Chart>,
}

/// manifest collection file content for one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestList {
    pub repository: RepoName,
    #[serde(default)]
    pub manifests: Vec<Manifest>,
}
