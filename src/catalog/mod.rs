//! Catalog module: the lock-guarded repository lifecycle.
//!
//! `RepositoryCatalog` is the stateful core; `CatalogRegistry` hands out
//! one shared instance per data directory. Query-driven bulk selection
//! lives in `filter`, scoped chart/manifest views in `managers`.

mod errors;
mod filter;
mod manager;
mod managers;
mod registry;

pub use errors::{CatalogError, CatalogResult};
pub use filter::{matches_item, matches_queries};
pub use manager::{CatalogConfig, RepositoryCatalog};
pub use managers::{ChartManager, ManifestManager};
pub use registry::CatalogRegistry;
