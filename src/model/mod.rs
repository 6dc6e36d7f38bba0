//! Domain model for the repository catalog.
//!
//! Everything here is a plain serializable shape: entities persisted to
//! disk, the root index, and the query language used by bulk operations.
//! Behavior lives in the `catalog` module; this one only defines data.

mod entity;
mod index;
mod name;
mod query;

pub use entity::{
    dedupe_by_name, Chart, ChartList, Manifest, ManifestList, Named, Repository, State, Version,
};
pub use index::{CatalogIndex, RepositoryRef};
pub use name::{InvalidNameError, RepoId, RepoName, DEFAULT_REPOSITORY};
pub use query::{Aggregator, Oper, Query, QueryItem};
