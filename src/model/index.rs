//! root index types: the lightweight repository listing persisted at the
//! top of the data directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::name::{RepoId, RepoName};

/// lightweight index entry pointing at one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub id: RepoId,
    pub name: RepoName,
}

/// The root catalog index.
///
/// Exactly one instance per data directory, persisted as a single file.
/// Entry order is insertion order and is significant for listing. Owned
/// by the catalog and mutated only inside lock-protected operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogIndex {
    #[serde(default)]
    pub repositories: Vec<RepositoryRef>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl CatalogIndex {
    /// create an empty index stamped with the current time
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            repositories: Vec::new(),
            created: now,
            updated: now,
        }
    }

    pub fn find_by_name(&self, name: &RepoName) -> Option<&RepositoryRef> {
        self.repositories.iter().find(|r| &r.name == name)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&RepositoryRef> {
        self.repositories.iter().find(|r| r.id.as_str() == id)
    }

    pub fn contains_name(&self, name: &RepoName) -> bool {
        self.find_by_name(name).is_some()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.find_by_id(id).is_some()
    }

    /// append a new entry at the end of the listing order
    pub fn push(&mut self, entry: RepositoryRef) {
        self.repositories.push(entry);
    }

    /// remove the entry with the given id, returning it if present
    pub fn remove_by_id(&mut self, id: &str) -> Option<RepositoryRef> {
        let pos = self.repositories.iter().position(|r| r.id.as_str() == id)?;
        Some(self.repositories.remove(pos))
    }

    /// update the name recorded for an id, returning false when unknown
    pub fn rename(&mut self, id: &str, new_name: RepoName) -> bool {
        match self.repositories.iter_mut().find(|r| r.id.as_str() == id) {
            Some(entry) => {
                entry.name = new_name;
                true
            }
            None => false,
        }
    }
}

impl Default for CatalogIndex {
    fn default() -> Self {
        Self::new()
    }
}
