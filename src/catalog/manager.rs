//! The repository catalog: lifecycle, invariants and locking over the
//! on-disk layout.
//!
//! One coarse reader/writer lock guards the root index. Reads take it
//! shared, mutations exclusive, and every operation holds it for its
//! whole duration. Repositories themselves are never cached: each read
//! reconstructs the entity from its three files.

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::catalog::errors::{CatalogError, CatalogResult};
use crate::catalog::filter;
use crate::catalog::managers::{ChartManager, ManifestManager};
use crate::model::{
    CatalogIndex, Chart, ChartList, Manifest, ManifestList, Query, RepoId, RepoName, Repository,
    RepositoryRef, State, DEFAULT_REPOSITORY,
};
use crate::storage::{archive, codec, layout, ArchiveFormat, Format, StorageError};

/// Catalog configuration options.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Path to the data directory.
    pub data_root: PathBuf,
    /// On-disk serialization format.
    pub format: Format,
    /// Create the data directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(".repohub"),
            format: Format::Yaml,
            create_if_missing: true,
        }
    }
}

impl CatalogConfig {
    /// Create a new configuration with the given data root.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Default::default()
        }
    }

    /// Set the on-disk format.
    pub fn format(mut self, value: Format) -> Self {
        self.format = value;
        self
    }

    /// Set create_if_missing flag.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}

/// The stateful core: owns the root index and the full lifecycle API.
#[derive(Debug)]
pub struct RepositoryCatalog {
    config: CatalogConfig,
    index: RwLock<CatalogIndex>,
}

impl RepositoryCatalog {
    /// Open a catalog at the given data root with default options.
    pub fn open_path(data_root: impl AsRef<Path>) -> CatalogResult<Self> {
        Self::open(CatalogConfig::new(data_root.as_ref()))
    }

    /// Open or bootstrap a catalog with custom configuration.
    ///
    /// An existing root index is loaded; a missing one is bootstrapped
    /// by persisting an empty index, creating the default repository
    /// and reloading.
    pub fn open(config: CatalogConfig) -> CatalogResult<Self> {
        info!(data_root = %config.data_root.display(), format = %config.format, "opening repository catalog");
        if !config.data_root.exists() {
            if !config.create_if_missing {
                return Err(CatalogError::Validation(format!(
                    "data root {} does not exist",
                    config.data_root.display()
                )));
            }
            fs::create_dir_all(&config.data_root).map_err(StorageError::from)?;
        }

        let catalog = Self {
            config,
            index: RwLock::new(CatalogIndex::new()),
        };
        if catalog.root_index_file().is_file() {
            catalog.refresh()?;
        } else {
            info!("no root index found, bootstrapping a new catalog");
            catalog.save_point()?;
            catalog.create(DEFAULT_REPOSITORY)?;
            catalog.refresh()?;
        }
        Ok(catalog)
    }

    /// Get the configuration.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Get the data root path.
    pub fn data_root(&self) -> &Path {
        &self.config.data_root
    }

    // ------------------------------------------------------------------
    // index persistence

    /// Persist the current index wholesale.
    pub fn save_point(&self) -> CatalogResult<()> {
        self.write_guarded(|index| self.persist_index(index))
    }

    /// Reload the root index from disk, replacing the in-memory state.
    ///
    /// Takes the write lock: the reload swaps the shared index even
    /// though the disk stays untouched.
    pub fn refresh(&self) -> CatalogResult<()> {
        self.write_guarded(|index| {
            let loaded: CatalogIndex = codec::load(&self.root_index_file(), self.config.format)?;
            *index = loaded;
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // reads

    /// Load every repository in the index, in listing order.
    ///
    /// Entries whose files fail to load are skipped with a warning; the
    /// listing is best effort.
    pub fn list_repositories(&self) -> CatalogResult<Vec<Repository>> {
        self.read_guarded(|index| {
            let mut out = Vec::new();
            for entry in &index.repositories {
                match self.load_repository(&entry.name) {
                    Ok(repository) => out.push(repository),
                    Err(e) => {
                        warn!(id = %entry.id, name = %entry.name, error = %e, "skipping unreadable repository")
                    }
                }
            }
            Ok(out)
        })
    }

    /// Get a single repository by raw name.
    pub fn get_by_name(&self, name: &str) -> CatalogResult<Repository> {
        let name = RepoName::new(name)?;
        self.read_guarded(|index| {
            let entry = index
                .find_by_name(&name)
                .ok_or_else(|| CatalogError::NameNotFound(name.clone()))?;
            self.load_repository(&entry.name)
        })
    }

    /// Get a single repository by id.
    pub fn get_by_id(&self, id: &str) -> CatalogResult<Repository> {
        self.read_guarded(|index| {
            let entry = index
                .find_by_id(id)
                .ok_or_else(|| CatalogError::IdNotFound(id.to_string()))?;
            self.load_repository(&entry.name)
        })
    }

    /// Load only the chart collection of a repository.
    pub fn list_charts(&self, id: &str) -> CatalogResult<Vec<Chart>> {
        self.read_guarded(|index| {
            let entry = index
                .find_by_id(id)
                .ok_or_else(|| CatalogError::IdNotFound(id.to_string()))?;
            let file =
                layout::charts_index_file(&self.config.data_root, &entry.name, self.config.format);
            let list: ChartList = codec::load(&file, self.config.format)?;
            Ok(list.charts)
        })
    }

    /// Load only the manifest collection of a repository.
    pub fn list_manifests(&self, id: &str) -> CatalogResult<Vec<Manifest>> {
        self.read_guarded(|index| {
            let entry = index
                .find_by_id(id)
                .ok_or_else(|| CatalogError::IdNotFound(id.to_string()))?;
            let file =
                layout::manifests_index_file(&self.config.data_root, &entry.name, self.config.format);
            let list: ManifestList = codec::load(&file, self.config.format)?;
            Ok(list.manifests)
        })
    }

    // ------------------------------------------------------------------
    // mutations

    /// Create a new empty repository under the normalized name.
    ///
    /// A name held by an active repository conflicts. A name whose
    /// holder was soft deleted is reclaimed: the stale entry and its
    /// files are purged before the create proceeds.
    pub fn create(&self, name: &str) -> CatalogResult<Repository> {
        let name = RepoName::new(name)?;
        info!(name = %name, "creating repository");
        self.write_guarded(|index| self.create_locked(index, name))
    }

    /// Merge updated content into an existing repository.
    ///
    /// Collections merge with existing items first, deduplicated by
    /// name. A changed name renames the directory and the index entry;
    /// colliding with a different repository is rejected.
    pub fn update(&self, id: &str, incoming: Repository) -> CatalogResult<Repository> {
        info!(id, "updating repository");
        self.write_guarded(|index| self.update_locked(index, id, incoming))
    }

    /// Replace a repository's content wholesale.
    ///
    /// Unlike `update`, a name collision with a different repository is
    /// not rejected: the colliding repository is absorbed. Its
    /// collections are appended behind the incoming ones and its entry
    /// and files are purged.
    pub fn override_repository(&self, id: &str, incoming: Repository) -> CatalogResult<Repository> {
        info!(id, "overriding repository");
        self.write_guarded(|index| self.override_locked(index, id, incoming))
    }

    /// Rename a repository, moving its directory and index entry.
    pub fn rename(&self, old_name: &str, new_name: &str) -> CatalogResult<()> {
        let old_name = RepoName::new(old_name)?;
        let new_name = RepoName::new(new_name)?;
        info!(from = %old_name, to = %new_name, "renaming repository");
        self.write_guarded(|index| {
            let entry = index
                .find_by_name(&old_name)
                .cloned()
                .ok_or_else(|| CatalogError::NameNotFound(old_name.clone()))?;
            if entry.name.is_default() {
                return Err(CatalogError::DefaultProtected(entry.name));
            }
            if let Some(existing) = index.find_by_name(&new_name) {
                if existing.id != entry.id {
                    return Err(CatalogError::NameConflict {
                        name: new_name.clone(),
                        existing_id: existing.id.clone(),
                    });
                }
            }

            // read before the move so the detail file can be restamped
            let loaded = self.load_repository(&old_name);
            self.move_repository_dir(&old_name, &new_name)?;
            match loaded {
                Ok(mut repository) => {
                    repository.name = new_name.clone();
                    self.persist_repository(&repository)?;
                }
                Err(e) => {
                    warn!(name = %old_name, error = %e, "renaming a repository whose content is unreadable")
                }
            }
            index.rename(entry.id.as_str(), new_name.clone());
            self.persist_index(index)
        })
    }

    /// Hard-delete a repository by raw name.
    pub fn delete_by_name(&self, name: &str) -> CatalogResult<()> {
        let name = RepoName::new(name)?;
        info!(name = %name, "deleting repository by name");
        self.write_guarded(|index| {
            let entry = index
                .find_by_name(&name)
                .cloned()
                .ok_or_else(|| CatalogError::NameNotFound(name.clone()))?;
            if entry.name.is_default() {
                return Err(CatalogError::DefaultProtected(entry.name));
            }
            self.purge_locked(index, entry.id.as_str())
        })
    }

    /// Hard-delete a repository by id.
    pub fn delete_by_id(&self, id: &str) -> CatalogResult<()> {
        info!(id, "deleting repository by id");
        self.write_guarded(|index| {
            let entry = index
                .find_by_id(id)
                .cloned()
                .ok_or_else(|| CatalogError::IdNotFound(id.to_string()))?;
            if entry.name.is_default() {
                return Err(CatalogError::DefaultProtected(entry.name));
            }
            self.purge_locked(index, entry.id.as_str())
        })
    }

    /// Soft-delete every repository matching the queries.
    ///
    /// Matching repositories flip to state `deleted` and their detail
    /// files are re-persisted; index entries and files stay so the
    /// repositories remain restorable. The default repository is never
    /// touched. Per-item failures are collected into one bulk error
    /// while the successful subset stays applied.
    pub fn delete_repositories(
        &self,
        inclusive: bool,
        queries: &[Query],
    ) -> CatalogResult<Vec<Repository>> {
        info!(inclusive, groups = queries.len(), "bulk soft delete");
        self.write_guarded(|index| {
            let mut deleted = Vec::new();
            let mut failures = Vec::new();
            for entry in index.repositories.clone() {
                if entry.name.is_default() {
                    continue;
                }
                let mut repository = match self.load_repository(&entry.name) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(name = %entry.name, error = %e, "skipping unreadable repository");
                        continue;
                    }
                };
                if !filter::matches_queries(&repository, inclusive, queries) {
                    continue;
                }
                repository.state = State::Deleted;
                match self.persist_repository(&repository) {
                    Ok(()) => deleted.push(repository),
                    Err(e) => failures.push(format!("{}: {}", entry.name, e)),
                }
            }
            if failures.is_empty() {
                Ok(deleted)
            } else {
                Err(CatalogError::Bulk { failures })
            }
        })
    }

    /// Hard-delete every repository matching the queries.
    ///
    /// Same selection and aggregation rules as `delete_repositories`,
    /// but entries and files are removed permanently.
    pub fn purge_repositories(
        &self,
        inclusive: bool,
        queries: &[Query],
    ) -> CatalogResult<Vec<RepositoryRef>> {
        info!(inclusive, groups = queries.len(), "bulk purge");
        self.write_guarded(|index| {
            let mut purged = Vec::new();
            let mut failures = Vec::new();
            for entry in index.repositories.clone() {
                if entry.name.is_default() {
                    continue;
                }
                let repository = match self.load_repository(&entry.name) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(name = %entry.name, error = %e, "skipping unreadable repository");
                        continue;
                    }
                };
                if !filter::matches_queries(&repository, inclusive, queries) {
                    continue;
                }
                match self.purge_locked(index, entry.id.as_str()) {
                    Ok(()) => purged.push(entry),
                    Err(e) => failures.push(format!("{}: {}", entry.name, e)),
                }
            }
            if failures.is_empty() {
                Ok(purged)
            } else {
                Err(CatalogError::Bulk { failures })
            }
        })
    }

    // ------------------------------------------------------------------
    // backup and restore

    /// Compress one repository's directory into an archive file.
    pub fn backup(&self, id: &str, archive_file: &Path, format: ArchiveFormat) -> CatalogResult<()> {
        info!(id, archive = %archive_file.display(), "backing up repository");
        self.read_guarded(|index| {
            let entry = index
                .find_by_id(id)
                .ok_or_else(|| CatalogError::IdNotFound(id.to_string()))?;
            let dir = layout::repository_dir(&self.config.data_root, &entry.name);
            archive::compress(&dir, archive_file, format)?;
            Ok(())
        })
    }

    /// Decompress a backup archive into a fresh scratch directory.
    ///
    /// The live index is untouched; the returned path feeds `adopt`,
    /// which performs the actual reattachment.
    pub fn restore(&self, archive_file: &Path, format: ArchiveFormat) -> CatalogResult<PathBuf> {
        info!(archive = %archive_file.display(), "restoring archive into a scratch directory");
        self.write_guarded(|_index| {
            if archive_file.is_dir() {
                return Err(CatalogError::Validation(format!(
                    "archive {} is a directory, not a regular file",
                    archive_file.display()
                )));
            }
            if !archive_file.is_file() {
                return Err(CatalogError::Storage(StorageError::FileNotFound(
                    archive_file.to_path_buf(),
                )));
            }
            let scratch = tempfile::Builder::new()
                .prefix("repohub-restore-")
                .tempdir()
                .map_err(StorageError::from)?
                .keep();
            archive::decompress(archive_file, &scratch, format)?;
            Ok(scratch)
        })
    }

    /// Attach a restored repository directory to the catalog.
    ///
    /// `restored_dir` is the scratch directory produced by `restore`;
    /// the single top-level directory holding a detail file is adopted.
    /// An active holder of the same name is rejected unless `force`,
    /// which purges it first. A restored id already present in the
    /// index is replaced with a freshly generated one.
    pub fn adopt(&self, restored_dir: &Path, force: bool) -> CatalogResult<Repository> {
        info!(dir = %restored_dir.display(), force, "adopting restored repository");
        self.write_guarded(|index| self.adopt_locked(index, restored_dir, force))
    }

    // ------------------------------------------------------------------
    // per-repository managers

    /// Get the chart manager scoped to the repository with this id.
    pub fn chart_manager(&self, id: &str) -> CatalogResult<ChartManager> {
        Ok(ChartManager::new(self.get_by_id(id)?))
    }

    /// Get the chart manager scoped to the repository with this name.
    pub fn chart_manager_by_name(&self, name: &str) -> CatalogResult<ChartManager> {
        Ok(ChartManager::new(self.get_by_name(name)?))
    }

    /// Get the manifest manager scoped to the repository with this id.
    pub fn manifest_manager(&self, id: &str) -> CatalogResult<ManifestManager> {
        Ok(ManifestManager::new(self.get_by_id(id)?))
    }

    /// Get the manifest manager scoped to the repository with this name.
    pub fn manifest_manager_by_name(&self, name: &str) -> CatalogResult<ManifestManager> {
        Ok(ManifestManager::new(self.get_by_name(name)?))
    }

    // ------------------------------------------------------------------
    // locked implementations

    fn create_locked(&self, index: &mut CatalogIndex, name: RepoName) -> CatalogResult<Repository> {
        if let Some(existing) = index.find_by_name(&name) {
            // the default repository is never reclaimed, whatever its state
            let reclaimable = !existing.name.is_default()
                && self
                    .load_repository(&existing.name)
                    .map(|r| r.state == State::Deleted)
                    .unwrap_or(false);
            if !reclaimable {
                return Err(CatalogError::NameConflict {
                    name,
                    existing_id: existing.id.clone(),
                });
            }
            let stale = existing.id.clone();
            warn!(name = %name, id = %stale, "reclaiming name from soft-deleted repository");
            self.purge_locked(index, stale.as_str())?;
        }

        let repository = Repository::new(RepoId::generate(), name.clone(), State::Created);
        self.persist_repository(&repository)?;
        index.push(RepositoryRef {
            id: repository.id.clone(),
            name,
        });
        self.persist_index(index)?;
        Ok(repository)
    }

    fn update_locked(
        &self,
        index: &mut CatalogIndex,
        id: &str,
        incoming: Repository,
    ) -> CatalogResult<Repository> {
        let new_name = RepoName::new(incoming.name.as_str())?;
        let entry = index
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| CatalogError::IdNotFound(id.to_string()))?;
        let mut repository = self.load_repository(&entry.name)?;
        repository.merge_charts(incoming.charts);
        repository.merge_manifests(incoming.manifests);

        let old_name = entry.name;
        if new_name != old_name {
            if old_name.is_default() {
                return Err(CatalogError::DefaultProtected(old_name));
            }
            if let Some(existing) = index.find_by_name(&new_name) {
                if existing.id.as_str() != id {
                    return Err(CatalogError::NameConflict {
                        name: new_name,
                        existing_id: existing.id.clone(),
                    });
                }
            }
            self.move_repository_dir(&old_name, &new_name)?;
            index.rename(id, new_name.clone());
            self.persist_index(index)?;
        }
        repository.name = new_name;
        self.persist_repository(&repository)?;
        Ok(repository)
    }

    fn override_locked(
        &self,
        index: &mut CatalogIndex,
        id: &str,
        incoming: Repository,
    ) -> CatalogResult<Repository> {
        let new_name = RepoName::new(incoming.name.as_str())?;
        let entry = index
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| CatalogError::IdNotFound(id.to_string()))?;
        let mut repository = self.load_repository(&entry.name)?;
        repository.charts = incoming.charts;
        repository.manifests = incoming.manifests;
        repository.state = incoming.state;

        let old_name = entry.name;
        if new_name != old_name {
            if old_name.is_default() {
                return Err(CatalogError::DefaultProtected(old_name));
            }
            let absorb = index
                .find_by_name(&new_name)
                .filter(|e| e.id.as_str() != id)
                .cloned();
            if let Some(victim) = absorb {
                if victim.name.is_default() {
                    return Err(CatalogError::DefaultProtected(victim.name));
                }
                warn!(name = %new_name, absorbed_id = %victim.id, "override absorbs an existing repository");
                let absorbed = self.load_repository(&victim.name)?;
                repository.merge_charts(absorbed.charts);
                repository.merge_manifests(absorbed.manifests);
                self.purge_locked(index, victim.id.as_str())?;
            }
            self.move_repository_dir(&old_name, &new_name)?;
            index.rename(id, new_name.clone());
            self.persist_index(index)?;
        }
        repository.name = new_name;
        self.persist_repository(&repository)?;
        Ok(repository)
    }

    fn adopt_locked(
        &self,
        index: &mut CatalogIndex,
        restored_dir: &Path,
        force: bool,
    ) -> CatalogResult<Repository> {
        let source = self.find_restored_repository(restored_dir)?;
        let detail = source.join(format!("index.{}", self.config.format.extension()));
        let mut repository: Repository = codec::load(&detail, self.config.format)?;
        let name = RepoName::new(repository.name.as_str())?;

        if let Some(existing) = index.find_by_name(&name) {
            if !force {
                return Err(CatalogError::NameConflict {
                    name,
                    existing_id: existing.id.clone(),
                });
            }
            if existing.name.is_default() {
                return Err(CatalogError::DefaultProtected(existing.name.clone()));
            }
            let occupant = existing.id.clone();
            warn!(name = %name, id = %occupant, "adopt replaces the existing repository");
            self.purge_locked(index, occupant.as_str())?;
        }
        if index.contains_id(repository.id.as_str()) {
            let fresh = RepoId::generate();
            warn!(old = %repository.id, new = %fresh, "restored id already in use, generating a new one");
            repository.id = fresh;
        }
        repository.name = name.clone();

        let target = layout::repository_dir(&self.config.data_root, &name);
        copy_dir_recursive(&source, &target)?;
        // restamp identity in the detail file; collection files stay as restored
        let detail_file =
            layout::repository_detail_file(&self.config.data_root, &name, self.config.format);
        codec::save(&detail_file, &repository, self.config.format)?;

        index.push(RepositoryRef {
            id: repository.id.clone(),
            name: name.clone(),
        });
        self.persist_index(index)?;
        self.load_repository(&name)
    }

    /// hard delete: directory removed first, then the index entry
    fn purge_locked(&self, index: &mut CatalogIndex, id: &str) -> CatalogResult<()> {
        let entry = index
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| CatalogError::IdNotFound(id.to_string()))?;
        let dir = layout::repository_dir(&self.config.data_root, &entry.name);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(StorageError::from)?;
        }
        index.remove_by_id(id);
        self.persist_index(index)
    }

    // ------------------------------------------------------------------
    // unlocked helpers, called only while a lock is already held

    /// merge a repository from its detail file and two collection files
    fn load_repository(&self, name: &RepoName) -> CatalogResult<Repository> {
        let root = &self.config.data_root;
        let format = self.config.format;
        let mut repository: Repository =
            codec::load(&layout::repository_detail_file(root, name, format), format)?;
        let charts: ChartList = codec::load(&layout::charts_index_file(root, name, format), format)?;
        repository.charts = charts.charts;
        let manifests: ManifestList =
            codec::load(&layout::manifests_index_file(root, name, format), format)?;
        repository.manifests = manifests.manifests;
        Ok(repository)
    }

    /// write a repository's directory, detail file and collection files
    fn persist_repository(&self, repository: &Repository) -> CatalogResult<()> {
        let root = &self.config.data_root;
        let format = self.config.format;
        let name = &repository.name;
        fs::create_dir_all(layout::charts_dir(root, name)).map_err(StorageError::from)?;
        fs::create_dir_all(layout::manifests_dir(root, name)).map_err(StorageError::from)?;
        codec::save(
            &layout::repository_detail_file(root, name, format),
            repository,
            format,
        )?;
        let charts = ChartList {
            repository: name.clone(),
            charts: repository.charts.clone(),
        };
        codec::save(&layout::charts_index_file(root, name, format), &charts, format)?;
        let manifests = ManifestList {
            repository: name.clone(),
            manifests: repository.manifests.clone(),
        };
        codec::save(
            &layout::manifests_index_file(root, name, format),
            &manifests,
            format,
        )?;
        Ok(())
    }

    /// persist the index file, bumping the updated stamp
    fn persist_index(&self, index: &mut CatalogIndex) -> CatalogResult<()> {
        index.updated = Utc::now();
        codec::save(&self.root_index_file(), index, self.config.format)?;
        Ok(())
    }

    fn move_repository_dir(&self, old: &RepoName, new: &RepoName) -> CatalogResult<()> {
        let old_dir = layout::repository_dir(&self.config.data_root, old);
        let new_dir = layout::repository_dir(&self.config.data_root, new);
        if old_dir.is_dir() {
            debug!(from = %old, to = %new, "renaming repository directory");
            fs::rename(&old_dir, &new_dir).map_err(StorageError::from)?;
        } else {
            debug!(name = %new, "creating directory for repository without one");
            fs::create_dir_all(&new_dir).map_err(StorageError::from)?;
        }
        Ok(())
    }

    /// locate the restored repository directory inside a scratch dir
    fn find_restored_repository(&self, restored_dir: &Path) -> CatalogResult<PathBuf> {
        let detail_name = format!("index.{}", self.config.format.extension());
        for entry in fs::read_dir(restored_dir).map_err(StorageError::from)? {
            let entry = entry.map_err(StorageError::from)?;
            let path = entry.path();
            if path.is_dir() && path.join(&detail_name).is_file() {
                return Ok(path);
            }
        }
        Err(CatalogError::Validation(format!(
            "no repository directory with an {} detail file under {}",
            detail_name,
            restored_dir.display()
        )))
    }

    fn root_index_file(&self) -> PathBuf {
        layout::root_index_file(&self.config.data_root, self.config.format)
    }

    // ------------------------------------------------------------------
    // lock wrappers

    /// run under the shared lock, converting panics into errors
    fn read_guarded<T>(
        &self,
        f: impl FnOnce(&CatalogIndex) -> CatalogResult<T>,
    ) -> CatalogResult<T> {
        match panic::catch_unwind(AssertUnwindSafe(|| {
            let index = self.index.read();
            f(&index)
        })) {
            Ok(result) => result,
            Err(panic) => Err(panic_error(panic)),
        }
    }

    /// run under the exclusive lock, converting panics into errors
    fn write_guarded<T>(
        &self,
        f: impl FnOnce(&mut CatalogIndex) -> CatalogResult<T>,
    ) -> CatalogResult<T> {
        match panic::catch_unwind(AssertUnwindSafe(|| {
            let mut index = self.index.write();
            f(&mut index)
        })) {
            Ok(result) => result,
            Err(panic) => Err(panic_error(panic)),
        }
    }
}

/// recover a usable message from a payload caught during unwind
fn panic_error(panic: Box<dyn Any + Send>) -> CatalogError {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unspecified panic".to_string()
    };
    CatalogError::Storage(StorageError::Internal(message))
}

fn copy_dir_recursive(source: &Path, target: &Path) -> CatalogResult<()> {
    fs::create_dir_all(target).map_err(StorageError::from)?;
    for entry in fs::read_dir(source).map_err(StorageError::from)? {
        let entry = entry.map_err(StorageError::from)?;
        let from = entry.path();
        let to = target.join(entry.file_name());
        if from.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(StorageError::from)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::model::{Aggregator, QueryItem};

    fn setup_catalog() -> (TempDir, RepositoryCatalog) {
        let dir = TempDir::new().unwrap();
        let catalog = RepositoryCatalog::open(CatalogConfig::new(dir.path())).unwrap();
        (dir, catalog)
    }

    fn chart(name: &str) -> Chart {
        Chart {
            id: format!("chart-{}", name),
            name: name.to_string(),
            versions: Vec::new(),
            state: State::Ready,
        }
    }

    fn incoming(name: &str, charts: Vec<Chart>) -> Repository {
        let mut repo = Repository::new(
            RepoId::new("ignored"),
            RepoName::new(name).unwrap(),
            State::Ready,
        );
        repo.charts = charts;
        repo
    }

    fn name_query(value: &str) -> Query {
        Query::new(vec![QueryItem::new("name", value, Aggregator::Eq)])
    }

    #[test]
    fn test_open_bootstraps_default() {
        let (dir, catalog) = setup_catalog();
        assert!(dir.path().join("repositories.yaml").is_file());

        let default = catalog.get_by_name(DEFAULT_REPOSITORY).unwrap();
        assert!(default.name.is_default());
        assert_eq!(default.state, State::Created);
        assert_eq!(catalog.list_repositories().unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_loads_existing() {
        let dir = TempDir::new().unwrap();
        let id = {
            let catalog = RepositoryCatalog::open(CatalogConfig::new(dir.path())).unwrap();
            catalog.create("persistent").unwrap().id
        };
        let catalog = RepositoryCatalog::open_path(dir.path()).unwrap();
        let found = catalog.get_by_name("persistent").unwrap();
        assert_eq!(found.id, id);
        assert_eq!(catalog.list_repositories().unwrap().len(), 2);
    }

    #[test]
    fn test_open_missing_root_without_create() {
        let dir = TempDir::new().unwrap();
        let config = CatalogConfig::new(dir.path().join("absent")).create_if_missing(false);
        let err = RepositoryCatalog::open(config).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_create_normalizes_and_round_trips() {
        let (_dir, catalog) = setup_catalog();
        let created = catalog.create("  My Repo  ").unwrap();
        assert_eq!(created.name.as_str(), "my-repo");
        assert_eq!(created.state, State::Created);

        // lookup goes through the same normalization
        let fetched = catalog.get_by_name("My Repo").unwrap();
        assert_eq!(fetched.id, created.id);

        let other = catalog.create("other").unwrap();
        assert_ne!(other.id, created.id);
    }

    #[test]
    fn test_create_validation_and_conflict() {
        let (_dir, catalog) = setup_catalog();
        assert!(catalog.create("").unwrap_err().is_validation());
        assert!(catalog.create("   ").unwrap_err().is_validation());

        catalog.create("taken").unwrap();
        let err = catalog.create("Taken").unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_default_repository_is_protected() {
        let (_dir, catalog) = setup_catalog();
        let default_id = catalog.get_by_name(DEFAULT_REPOSITORY).unwrap().id;

        assert!(matches!(
            catalog.delete_by_name(DEFAULT_REPOSITORY).unwrap_err(),
            CatalogError::DefaultProtected(_)
        ));
        assert!(matches!(
            catalog.delete_by_id(default_id.as_str()).unwrap_err(),
            CatalogError::DefaultProtected(_)
        ));
        assert!(matches!(
            catalog.rename(DEFAULT_REPOSITORY, "renamed").unwrap_err(),
            CatalogError::DefaultProtected(_)
        ));

        // no side effects
        assert!(catalog.get_by_name(DEFAULT_REPOSITORY).is_ok());
        assert_eq!(catalog.list_repositories().unwrap().len(), 1);
    }

    #[test]
    fn test_default_protection_covers_indirect_paths() {
        let (_dir, catalog) = setup_catalog();
        let default_id = catalog.get_by_name(DEFAULT_REPOSITORY).unwrap().id;

        // update and override cannot rename the default away
        assert!(matches!(
            catalog
                .update(default_id.as_str(), incoming("elsewhere", Vec::new()))
                .unwrap_err(),
            CatalogError::DefaultProtected(_)
        ));
        assert!(matches!(
            catalog
                .override_repository(default_id.as_str(), incoming("elsewhere", Vec::new()))
                .unwrap_err(),
            CatalogError::DefaultProtected(_)
        ));

        // override cannot absorb the default as a collision victim
        let other = catalog.create("bystander").unwrap();
        assert!(matches!(
            catalog
                .override_repository(other.id.as_str(), incoming(DEFAULT_REPOSITORY, Vec::new()))
                .unwrap_err(),
            CatalogError::DefaultProtected(_)
        ));

        // content updates that keep the name stay allowed
        let updated = catalog
            .update(
                default_id.as_str(),
                incoming(DEFAULT_REPOSITORY, vec![chart("shared")]),
            )
            .unwrap();
        assert_eq!(updated.charts.len(), 1);
        assert_eq!(
            catalog.get_by_name(DEFAULT_REPOSITORY).unwrap().id,
            default_id
        );
    }

    #[test]
    fn test_get_missing() {
        let (_dir, catalog) = setup_catalog();
        assert!(catalog.get_by_name("ghost").unwrap_err().is_not_found());
        assert!(catalog.get_by_id("no-such-id").unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_merges_collections() {
        let (_dir, catalog) = setup_catalog();
        let created = catalog.create("merge-me").unwrap();

        catalog
            .update(created.id.as_str(), incoming("merge-me", vec![chart("first")]))
            .unwrap();
        let updated = catalog
            .update(
                created.id.as_str(),
                incoming("merge-me", vec![chart("first"), chart("second")]),
            )
            .unwrap();

        // dedupe by name, existing first
        assert_eq!(updated.charts.len(), 2);
        assert_eq!(updated.charts[0].name, "first");
        assert_eq!(updated.charts[1].name, "second");
        // state on disk is untouched by update
        assert_eq!(
            catalog.get_by_id(created.id.as_str()).unwrap().state,
            State::Created
        );
    }

    #[test]
    fn test_update_renames_directory() {
        let (dir, catalog) = setup_catalog();
        let created = catalog.create("before").unwrap();

        let updated = catalog
            .update(created.id.as_str(), incoming("after", vec![chart("kept")]))
            .unwrap();
        assert_eq!(updated.name.as_str(), "after");

        assert!(!dir.path().join("repositories").join("before").exists());
        assert!(dir.path().join("repositories").join("after").is_dir());
        assert_eq!(catalog.get_by_name("after").unwrap().id, created.id);
        assert!(catalog.get_by_name("before").unwrap_err().is_not_found());
        assert_eq!(catalog.get_by_name("after").unwrap().charts.len(), 1);
    }

    #[test]
    fn test_update_rejects_name_collision() {
        let (_dir, catalog) = setup_catalog();
        catalog.create("occupied").unwrap();
        let other = catalog.create("mover").unwrap();

        let err = catalog
            .update(other.id.as_str(), incoming("occupied", Vec::new()))
            .unwrap_err();
        assert!(err.is_conflict());
        // nothing moved
        assert!(catalog.get_by_name("mover").is_ok());
    }

    #[test]
    fn test_update_unknown_id() {
        let (_dir, catalog) = setup_catalog();
        let err = catalog
            .update("missing", incoming("whatever", Vec::new()))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_override_replaces_wholesale() {
        let (_dir, catalog) = setup_catalog();
        let created = catalog.create("overridden").unwrap();
        catalog
            .update(created.id.as_str(), incoming("overridden", vec![chart("old")]))
            .unwrap();

        let result = catalog
            .override_repository(created.id.as_str(), incoming("overridden", vec![chart("new")]))
            .unwrap();
        assert_eq!(result.charts.len(), 1);
        assert_eq!(result.charts[0].name, "new");
        assert_eq!(result.state, State::Ready);
    }

    #[test]
    fn test_override_absorbs_collision() {
        let (dir, catalog) = setup_catalog();
        let victim = catalog.create("landing").unwrap();
        catalog
            .update(
                victim.id.as_str(),
                incoming("landing", vec![chart("vic"), chart("shared")]),
            )
            .unwrap();
        let mover = catalog.create("mover").unwrap();

        let payload = incoming("landing", vec![chart("shared"), chart("mine")]);
        let merged = catalog
            .override_repository(mover.id.as_str(), payload)
            .unwrap();

        // mover keeps its id and takes the name; victim is gone
        assert_eq!(merged.id, mover.id);
        assert_eq!(catalog.get_by_name("landing").unwrap().id, mover.id);
        assert!(catalog
            .get_by_id(victim.id.as_str())
            .unwrap_err()
            .is_not_found());
        assert!(!dir.path().join("repositories").join("mover").exists());

        // incoming first, absorbed appended, shared deduped to the incoming copy
        let names: Vec<&str> = merged.charts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["shared", "mine", "vic"]);
    }

    #[test]
    fn test_rename_moves_everything() {
        let (dir, catalog) = setup_catalog();
        let created = catalog.create("old-name").unwrap();

        catalog.rename("old-name", "New Name").unwrap();

        assert!(catalog.get_by_name("old-name").unwrap_err().is_not_found());
        let renamed = catalog.get_by_name("new-name").unwrap();
        assert_eq!(renamed.id, created.id);
        // the detail file carries the new name too
        assert_eq!(renamed.name.as_str(), "new-name");
        assert!(dir.path().join("repositories").join("new-name").is_dir());
        assert!(!dir.path().join("repositories").join("old-name").exists());
    }

    #[test]
    fn test_rename_conflicts_and_missing() {
        let (_dir, catalog) = setup_catalog();
        catalog.create("a").unwrap();
        catalog.create("b").unwrap();

        assert!(catalog.rename("a", "b").unwrap_err().is_conflict());
        assert!(catalog.rename("ghost", "c").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_by_name_removes_files_and_entry() {
        let (dir, catalog) = setup_catalog();
        catalog.create("doomed").unwrap();
        assert!(dir.path().join("repositories").join("doomed").is_dir());

        catalog.delete_by_name("doomed").unwrap();

        assert!(catalog.get_by_name("doomed").unwrap_err().is_not_found());
        assert!(!dir.path().join("repositories").join("doomed").exists());
        assert_eq!(catalog.list_repositories().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_by_id() {
        let (_dir, catalog) = setup_catalog();
        let created = catalog.create("by-id").unwrap();
        catalog.delete_by_id(created.id.as_str()).unwrap();
        assert!(catalog
            .get_by_id(created.id.as_str())
            .unwrap_err()
            .is_not_found());
        assert!(catalog.delete_by_id("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_soft_delete_keeps_files_and_entry() {
        let (dir, catalog) = setup_catalog();
        catalog.create("softy").unwrap();

        let deleted = catalog
            .delete_repositories(true, &[name_query("softy")])
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].state, State::Deleted);

        // still listed, still on disk, state flipped
        let softy = catalog.get_by_name("softy").unwrap();
        assert_eq!(softy.state, State::Deleted);
        assert!(dir.path().join("repositories").join("softy").is_dir());
    }

    #[test]
    fn test_create_reclaims_soft_deleted_name() {
        let (_dir, catalog) = setup_catalog();
        let first = catalog.create("phoenix").unwrap();
        catalog
            .delete_repositories(true, &[name_query("phoenix")])
            .unwrap();

        let second = catalog.create("phoenix").unwrap();
        assert_ne!(second.id, first.id);
        assert_eq!(catalog.get_by_name("phoenix").unwrap().state, State::Created);
        // the stale entry was purged, not shadowed
        assert!(catalog
            .get_by_id(first.id.as_str())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_bulk_without_queries_spares_default() {
        let (_dir, catalog) = setup_catalog();
        catalog.create("one").unwrap();
        catalog.create("two").unwrap();

        let deleted = catalog.delete_repositories(true, &[]).unwrap();
        assert_eq!(deleted.len(), 2);

        let default = catalog.get_by_name(DEFAULT_REPOSITORY).unwrap();
        assert_eq!(default.state, State::Created);
    }

    #[test]
    fn test_purge_repositories_by_query() {
        let (dir, catalog) = setup_catalog();
        catalog.create("keep-me").unwrap();
        catalog.create("purge-me").unwrap();

        let purged = catalog
            .purge_repositories(true, &[name_query("purge-me")])
            .unwrap();
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].name.as_str(), "purge-me");

        assert!(catalog.get_by_name("purge-me").unwrap_err().is_not_found());
        assert!(!dir.path().join("repositories").join("purge-me").exists());
        assert!(catalog.get_by_name("keep-me").is_ok());
    }

    #[test]
    fn test_exclusive_mode_matches_nothing_with_queries() {
        let (_dir, catalog) = setup_catalog();
        catalog.create("survivor").unwrap();

        let deleted = catalog
            .delete_repositories(false, &[name_query("survivor")])
            .unwrap();
        assert!(deleted.is_empty());
        assert_eq!(catalog.get_by_name("survivor").unwrap().state, State::Created);
    }

    #[test]
    fn test_list_collections() {
        let (_dir, catalog) = setup_catalog();
        let created = catalog.create("stocked").unwrap();
        catalog
            .update(
                created.id.as_str(),
                incoming("stocked", vec![chart("a"), chart("b")]),
            )
            .unwrap();

        let charts = catalog.list_charts(created.id.as_str()).unwrap();
        assert_eq!(charts.len(), 2);
        assert!(catalog.list_manifests(created.id.as_str()).unwrap().is_empty());
        assert!(catalog.list_charts("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_backup_restore_adopt_round_trip() {
        let (dir, catalog) = setup_catalog();
        let created = catalog.create("travel").unwrap();
        catalog
            .update(created.id.as_str(), incoming("travel", vec![chart("cargo")]))
            .unwrap();

        let archive_file = dir.path().join("travel.zip");
        catalog
            .backup(created.id.as_str(), &archive_file, ArchiveFormat::Zip)
            .unwrap();
        assert!(archive_file.is_file());

        catalog.delete_by_name("travel").unwrap();
        assert!(catalog.get_by_name("travel").unwrap_err().is_not_found());

        let scratch = catalog.restore(&archive_file, ArchiveFormat::Zip).unwrap();
        let adopted = catalog.adopt(&scratch, false).unwrap();
        fs::remove_dir_all(&scratch).unwrap();

        assert_eq!(adopted.name.as_str(), "travel");
        assert_eq!(adopted.id, created.id);
        let back = catalog.get_by_name("travel").unwrap();
        assert_eq!(back.charts.len(), 1);
        assert_eq!(back.charts[0].name, "cargo");
    }

    #[test]
    fn test_adopt_collision_requires_force() {
        let (dir, catalog) = setup_catalog();
        let created = catalog.create("busy").unwrap();
        let archive_file = dir.path().join("busy.tar.gz");
        catalog
            .backup(created.id.as_str(), &archive_file, ArchiveFormat::TarGz)
            .unwrap();

        let scratch = catalog.restore(&archive_file, ArchiveFormat::TarGz).unwrap();
        let err = catalog.adopt(&scratch, false).unwrap_err();
        assert!(err.is_conflict());

        let adopted = catalog.adopt(&scratch, true).unwrap();
        fs::remove_dir_all(&scratch).unwrap();
        assert_eq!(adopted.id, created.id);
        assert_eq!(catalog.list_repositories().unwrap().len(), 2);
    }

    #[test]
    fn test_adopt_regenerates_taken_id() {
        let (dir, catalog) = setup_catalog();
        let created = catalog.create("original").unwrap();
        let archive_file = dir.path().join("original.zip");
        catalog
            .backup(created.id.as_str(), &archive_file, ArchiveFormat::Zip)
            .unwrap();

        // free the name but keep the id alive
        catalog.rename("original", "moved-away").unwrap();

        let scratch = catalog.restore(&archive_file, ArchiveFormat::Zip).unwrap();
        let adopted = catalog.adopt(&scratch, false).unwrap();
        fs::remove_dir_all(&scratch).unwrap();

        assert_eq!(adopted.name.as_str(), "original");
        assert_ne!(adopted.id, created.id);
        assert_eq!(catalog.get_by_name("moved-away").unwrap().id, created.id);
    }

    #[test]
    fn test_adopt_never_replaces_default() {
        let (dir, catalog) = setup_catalog();
        let default_id = catalog.get_by_name(DEFAULT_REPOSITORY).unwrap().id;
        let archive_file = dir.path().join("default.zip");
        catalog
            .backup(default_id.as_str(), &archive_file, ArchiveFormat::Zip)
            .unwrap();

        let scratch = catalog.restore(&archive_file, ArchiveFormat::Zip).unwrap();
        let err = catalog.adopt(&scratch, true).unwrap_err();
        assert!(matches!(err, CatalogError::DefaultProtected(_)));
        fs::remove_dir_all(&scratch).unwrap();

        assert_eq!(
            catalog.get_by_name(DEFAULT_REPOSITORY).unwrap().id,
            default_id
        );
    }

    #[test]
    fn test_restore_rejects_non_archives() {
        let (dir, catalog) = setup_catalog();
        let err = catalog.restore(dir.path(), ArchiveFormat::Zip).unwrap_err();
        assert!(err.is_validation());

        let err = catalog
            .restore(&dir.path().join("absent.zip"), ArchiveFormat::Zip)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_save_point_writes_valid_index() {
        let (dir, catalog) = setup_catalog();
        catalog.create("checked").unwrap();
        catalog.save_point().unwrap();

        let index: CatalogIndex = codec::load(
            &layout::root_index_file(dir.path(), Format::Yaml),
            Format::Yaml,
        )
        .unwrap();
        assert_eq!(index.repositories.len(), 2);
        assert!(index.updated >= index.created);
    }

    #[test]
    fn test_concurrent_reads_see_consistent_state() {
        let (dir, catalog) = setup_catalog();

        std::thread::scope(|scope| {
            let writer = scope.spawn(|| {
                for i in 0..16 {
                    catalog.create(&format!("writer-{}", i)).unwrap();
                }
            });
            // reads interleaving with the writes must observe some prefix
            // of the creations, never an error or a partial entry
            while !writer.is_finished() {
                let listed = catalog.list_repositories().unwrap();
                assert!(!listed.is_empty() && listed.len() <= 17);
                assert!(listed[0].name.is_default());
            }
            writer.join().unwrap();
        });

        let index: CatalogIndex = codec::load(
            &layout::root_index_file(dir.path(), Format::Yaml),
            Format::Yaml,
        )
        .unwrap();
        assert_eq!(index.repositories.len(), 17);
        assert_eq!(catalog.list_repositories().unwrap().len(), 17);
    }

    #[test]
    fn test_refresh_rereads_disk() {
        let (dir, catalog) = setup_catalog();
        catalog.create("volatile").unwrap();

        // drop the entry behind the catalog's back
        let file = layout::root_index_file(dir.path(), Format::Yaml);
        let mut index: CatalogIndex = codec::load(&file, Format::Yaml).unwrap();
        index.repositories.retain(|r| r.name.is_default());
        codec::save(&file, &index, Format::Yaml).unwrap();

        catalog.refresh().unwrap();
        assert_eq!(catalog.list_repositories().unwrap().len(), 1);
        assert!(catalog.get_by_name("volatile").unwrap_err().is_not_found());
    }

    #[test]
    fn test_json_format_catalog() {
        let dir = TempDir::new().unwrap();
        let config = CatalogConfig::new(dir.path()).format(Format::Json);
        let catalog = RepositoryCatalog::open(config).unwrap();

        assert!(dir.path().join("repositories.json").is_file());
        let created = catalog.create("json-repo").unwrap();
        assert_eq!(
            catalog.get_by_id(created.id.as_str()).unwrap().name.as_str(),
            "json-repo"
        );
        assert!(dir
            .path()
            .join("repositories")
            .join("json-repo")
            .join("index.json")
            .is_file());
    }

    #[test]
    fn test_managers_scope_to_repository() {
        let (_dir, catalog) = setup_catalog();
        let created = catalog.create("managed").unwrap();
        catalog
            .update(created.id.as_str(), incoming("managed", vec![chart("c")]))
            .unwrap();

        let by_id = catalog.chart_manager(created.id.as_str()).unwrap();
        assert_eq!(by_id.list().len(), 1);
        let by_name = catalog.manifest_manager_by_name("managed").unwrap();
        assert!(by_name.list().is_empty());
        assert!(catalog.chart_manager("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_skips_unreadable_entries() {
        let (dir, catalog) = setup_catalog();
        catalog.create("healthy").unwrap();
        catalog.create("broken").unwrap();

        // corrupt one detail file
        fs::write(
            dir.path()
                .join("repositories")
                .join("broken")
                .join("index.yaml"),
            ":: not yaml {{{",
        )
        .unwrap();

        let listed = catalog.list_repositories().unwrap();
        let names: Vec<&str> = listed.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains(&"healthy"));
        assert!(!names.contains(&"broken"));

        // targeted get surfaces the failure instead
        assert!(catalog.get_by_name("broken").is_err());
    }
}
