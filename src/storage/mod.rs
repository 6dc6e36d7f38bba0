//! storage layer for the repository catalog
//!
//! This module provides the persistence primitives the catalog is built
//! on. The catalog layer uses this API and never touches the filesystem
//! layout, serde backends or archive crates directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              RepositoryCatalog              │
//! │       (lifecycle, invariants, locking)      │
//! └─────────────────────────────────────────────┘
//!          │              │              │
//!          ▼              ▼              ▼
//!    ┌──────────┐   ┌──────────┐   ┌──────────┐
//!    │  layout  │   │  codec   │   │ archive  │
//!    │  (paths) │   │ (files)  │   │ (backup) │
//!    └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use repohub::storage::{codec, layout, Format};
//!
//! let path = layout::root_index_file(data_root, Format::Yaml);
//! let index: CatalogIndex = codec::load(&path, Format::Yaml)?;
//! codec::save(&path, &index, Format::Yaml)?;
//! ```

pub mod archive;
pub mod codec;
mod errors;
pub mod layout;

// Re-export public API
pub use archive::ArchiveFormat;
pub use codec::Format;
pub use errors::{StorageError, StorageResult};
