//! Per-repository managers: scoped views over one repository's
//! collections, handed out by the catalog factories.
//!
//! Packaging and cluster integration have not landed, so the action
//! methods fail with an unsupported-operation error. Listing works on
//! the snapshot captured when the manager was created.

use tracing::debug;

use crate::catalog::errors::{CatalogError, CatalogResult};
use crate::model::{Chart, Manifest, Repository};

/// Chart operations scoped to a single repository.
#[derive(Debug)]
pub struct ChartManager {
    repository: Repository,
}

impl ChartManager {
    pub(crate) fn new(repository: Repository) -> Self {
        debug!(repository = %repository.name, charts = repository.charts.len(), "chart manager created");
        Self { repository }
    }

    /// The repository this manager is scoped to.
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// List the charts in scope.
    pub fn list(&self) -> &[Chart] {
        &self.repository.charts
    }

    /// Find a chart by name.
    pub fn find(&self, name: &str) -> Option<&Chart> {
        self.repository.charts.iter().find(|c| c.name == name)
    }

    /// Verify a packaged chart.
    pub fn verify(&self, name: &str) -> CatalogResult<()> {
        debug!(repository = %self.repository.name, chart = name, "verify requested");
        Err(CatalogError::Unsupported("chart verification"))
    }

    /// Install a chart into a target cluster.
    pub fn install(&self, name: &str) -> CatalogResult<()> {
        debug!(repository = %self.repository.name, chart = name, "install requested");
        Err(CatalogError::Unsupported("chart installation"))
    }
}

/// Manifest operations scoped to a single repository.
pub struct ManifestManager {
    repository: Repository,
}

impl ManifestManager {
    pub(crate) fn new(repository: Repository) -> Self {
        debug!(repository = %repository.name, manifests = repository.manifests.len(), "manifest manager created");
        Self { repository }
    }

    /// The repository this manager is scoped to.
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// List the manifests in scope.
    pub fn list(&self) -> &[Manifest] {
        &self.repository.manifests
    }

    /// Find a manifest by name.
    pub fn find(&self, name: &str) -> Option<&Manifest> {
        self.repository.manifests.iter().find(|m| m.name == name)
    }

    /// Verify a manifest against a cluster.
    pub fn verify(&self, name: &str) -> CatalogResult<()> {
        debug!(repository = %self.repository.name, manifest = name, "verify requested");
        Err(CatalogError::Unsupported("manifest verification"))
    }

    /// Deploy a manifest to a target cluster.
    pub fn deploy(&self, name: &str) -> CatalogResult<()> {
        debug!(repository = %self.repository.name, manifest = name, "deploy requested");
        Err(CatalogError::Unsupported("manifest deployment"))
    }
}
