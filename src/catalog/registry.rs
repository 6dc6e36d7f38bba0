//! Keyed factory handing out one shared catalog per data directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::catalog::errors::{CatalogError, CatalogResult};
use crate::catalog::manager::{CatalogConfig, RepositoryCatalog};
use crate::storage::StorageError;

/// Memoizes catalog instances by canonical data root.
///
/// Two opens of the same directory, however spelled, share one
/// instance and therefore one lock. The composition root owns the
/// registry; there is no global state.
#[derive(Default)]
pub struct CatalogRegistry {
    catalogs: Mutex<HashMap<PathBuf, Arc<RepositoryCatalog>>>,
}

impl CatalogRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or return the memoized catalog for this configuration.
    pub fn open(&self, config: CatalogConfig) -> CatalogResult<Arc<RepositoryCatalog>> {
        if !config.data_root.exists() && !config.create_if_missing {
            return Err(CatalogError::Validation(format!(
                "data root {} does not exist",
                config.data_root.display()
            )));
        }
        // canonicalization needs the directory on disk
        fs::create_dir_all(&config.data_root).map_err(StorageError::from)?;
        let key = config.data_root.canonicalize().map_err(StorageError::from)?;

        let mut catalogs = self.catalogs.lock();
        if let Some(existing) = catalogs.get(&key) {
            debug!(data_root = %key.display(), "reusing catalog instance");
            return Ok(Arc::clone(existing));
        }
        let catalog = Arc::new(RepositoryCatalog::open(config)?);
        catalogs.insert(key, Arc::clone(&catalog));
        Ok(catalog)
    }

    /// Drop the memoized instance for a data root, if any.
    pub fn close(&self, data_root: &Path) -> bool {
        let key = match data_root.canonicalize() {
            Ok(k) => k,
            Err(_) => data_root.to_path_buf(),
        };
        self.catalogs.lock().remove(&key).is_some()
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.catalogs.lock().len()
    }

    /// Whether the registry holds no instances.
    pub fn is_empty(&self) -> bool {
        self.catalogs.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_open_memoizes_per_root() {
        let dir = TempDir::new().unwrap();
        let registry = CatalogRegistry::new();

        let first = registry.open(CatalogConfig::new(dir.path())).unwrap();
        let second = registry.open(CatalogConfig::new(dir.path())).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_path_spellings_share_instance() {
        let dir = TempDir::new().unwrap();
        let registry = CatalogRegistry::new();

        let plain = registry.open(CatalogConfig::new(dir.path())).unwrap();
        let dotted = registry
            .open(CatalogConfig::new(dir.path().join(".")))
            .unwrap();

        assert!(Arc::ptr_eq(&plain, &dotted));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_close_releases_instance() {
        let dir = TempDir::new().unwrap();
        let registry = CatalogRegistry::new();

        let first = registry.open(CatalogConfig::new(dir.path())).unwrap();
        assert!(registry.close(dir.path()));
        assert!(!registry.close(dir.path()));
        assert!(registry.is_empty());

        let second = registry.open(CatalogConfig::new(dir.path())).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_root_without_create() {
        let dir = TempDir::new().unwrap();
        let registry = CatalogRegistry::new();
        let config = CatalogConfig::new(dir.path().join("absent")).create_if_missing(false);
        assert!(registry.open(config).unwrap_err().is_validation());
    }
}
