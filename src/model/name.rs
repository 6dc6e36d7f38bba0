//! identifier and name newtypes for catalog entries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// name of the reserved repository that always exists after initialization
pub const DEFAULT_REPOSITORY: &str = "__default";

/// A unique repository identifier.
///
/// Assigned once when a repository is created and never reassigned for
/// the lifetime of the data directory. Ids survive renames; names do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId(String);

impl RepoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new ULID-based repository id.
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string().to_lowercase())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RepoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A normalized repository name.
///
/// Raw names are slugified on construction: surrounding whitespace is
/// trimmed, internal spaces become hyphens and the result is lowercased.
/// The normalized form is what appears in the index and on disk, so two
/// raw names that normalize alike address the same repository.
///
/// Names ending up empty after normalization are rejected, as are names
/// carrying path separators or parent-directory segments, since the name
/// doubles as a directory name under the data root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoName(String);

impl RepoName {
    /// create a new RepoName, normalizing and validating the input
    pub fn new(raw: impl AsRef<str>) -> Result<Self, InvalidNameError> {
        let normalized = raw.as_ref().trim().replace(' ', "-").to_lowercase();
        if normalized.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if normalized.contains('/') || normalized.contains('\\') || normalized.contains("..") {
            return Err(InvalidNameError::InvalidPath(normalized));
        }
        Ok(Self(normalized))
    }

    /// the reserved default repository name
    pub fn default_repository() -> Self {
        Self(DEFAULT_REPOSITORY.to_string())
    }

    /// check whether this is the protected default repository
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_REPOSITORY
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RepoName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// error type for invalid repository names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    InvalidPath(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::InvalidPath(name) => write!(f, "name cannot contain path segments: '{}'", name),
        }
    }
}

impl std::error::Error for InvalidNameError {}
