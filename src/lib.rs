//! RepoHub - A File-Backed Repository Catalog
//!
//! This crate manages a catalog of named repositories, each holding
//! versioned charts and deployment manifests. All metadata lives in
//! plain yaml, json or xml files under one data directory, so the whole
//! catalog can be inspected, diffed and backed up with ordinary tools.
//!
//! # Example
//!
//! ```no_run
//! use repohub::catalog::{CatalogConfig, RepositoryCatalog};
//!
//! let catalog = RepositoryCatalog::open(CatalogConfig::new("./data")).unwrap();
//! let repo = catalog.create("my charts").unwrap();
//! println!("created {} as {}", repo.name, repo.id);
//! ```

pub mod catalog;
pub mod model;
pub mod storage;
