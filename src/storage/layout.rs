//! Deterministic path resolution for the on-disk layout.
//!
//! Every component builds paths through these functions and never by
//! hand, so the layout is defined in exactly one place:
//!
//! ```text
//! <dataRoot>/repositories.<ext>                          root index
//! <dataRoot>/repositories/<repoName>/index.<ext>         repository detail
//! <dataRoot>/repositories/<repoName>/charts/index.<ext>  chart collection
//! <dataRoot>/repositories/<repoName>/kubefiles/index.<ext>  manifest collection
//! ```
//!
//! Paths are always built from the current normalized name; after a
//! rename, callers resolve again.

use std::path::{Path, PathBuf};

use crate::model::RepoName;
use crate::storage::codec::Format;

/// directory holding all repository directories
const REPOSITORIES_DIR: &str = "repositories";

/// manifest collections keep the historical `kubefiles` directory name
/// so existing data directories stay readable
const MANIFESTS_DIR: &str = "kubefiles";

const CHARTS_DIR: &str = "charts";

/// index file name inside a repository or collection directory
const INDEX_STEM: &str = "index";

/// path of the root catalog index file
pub fn root_index_file(data_root: &Path, format: Format) -> PathBuf {
    data_root.join(format!("{}.{}", REPOSITORIES_DIR, format.extension()))
}

/// directory holding one repository's files
pub fn repository_dir(data_root: &Path, name: &RepoName) -> PathBuf {
    data_root.join(REPOSITORIES_DIR).join(name.as_str())
}

/// path of one repository's detail file
pub fn repository_detail_file(data_root: &Path, name: &RepoName, format: Format) -> PathBuf {
    repository_dir(data_root, name).join(format!("{}.{}", INDEX_STEM, format.extension()))
}

/// directory holding one repository's chart data
pub fn charts_dir(data_root: &Path, name: &RepoName) -> PathBuf {
    repository_dir(data_root, name).join(CHARTS_DIR)
}

/// path of one repository's chart collection file
pub fn charts_index_file(data_root: &Path, name: &RepoName, format: Format) -> PathBuf {
    charts_dir(data_root, name).join(format!("{}.{}", INDEX_STEM, format.extension()))
}

/// directory holding one repository's manifest data
pub fn manifests_dir(data_root: &Path, name: &RepoName) -> PathBuf {
    repository_dir(data_root, name).join(MANIFESTS_DIR)
}

/// path of one repository's manifest collection file
pub fn manifests_index_file(data_root: &Path, name: &RepoName, format: Format) -> PathBuf {
    manifests_dir(data_root, name).join(format!("{}.{}", INDEX_STEM, format.extension()))
}
