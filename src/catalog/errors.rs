//! Catalog layer error types
//!
//! Operation-level failures: validation, lookup misses, name conflicts
//! and the protections around the default repository. Storage failures
//! bubble up wrapped so callers can classify without unpacking layers.

use thiserror::Error;

use crate::model::{InvalidNameError, RepoId, RepoName};
use crate::storage::StorageError;

/// result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// the main error type for catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    /// a raw repository name failed normalization
    #[error("invalid repository name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// input rejected before touching storage
    #[error("validation error: {0}")]
    Validation(String),

    /// no repository with the given name
    #[error("repository not found: name={0}")]
    NameNotFound(RepoName),

    /// no repository with the given id
    #[error("repository not found: id={0}")]
    IdNotFound(String),

    /// the name is already taken by another repository
    #[error("repository name {name} already in use by id {existing_id}")]
    NameConflict { name: RepoName, existing_id: RepoId },

    /// an operation would remove or rename the default repository
    #[error("repository {0} is the reserved default and cannot be deleted or renamed")]
    DefaultProtected(RepoName),

    /// some targets of a bulk operation failed while others were applied
    #[error("bulk operation partially failed: [{}]", .failures.join("; "))]
    Bulk { failures: Vec<String> },

    /// the operation is not available at this layer
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// storage error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CatalogError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        match self {
            CatalogError::NameNotFound(_) | CatalogError::IdNotFound(_) => true,
            CatalogError::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// check if this error is a name conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, CatalogError::NameConflict { .. })
    }

    /// check if this error rejected the input itself
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CatalogError::InvalidName(_) | CatalogError::Validation(_)
        )
    }
}
