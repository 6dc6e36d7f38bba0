//! Storage layer error types
//!
//! All errors that can occur while reading, writing or archiving the
//! on-disk layout are defined here. We use `thiserror` for ergonomic
//! error definition and better error messages.

use std::path::PathBuf;

use thiserror::Error;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// the structured file does not exist
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// file content did not parse into the target shape
    #[error("decode error at {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// value could not be serialized for writing
    #[error("encode error at {path}: {reason}")]
    Encode { path: PathBuf, reason: String },

    /// compression or decompression failed
    #[error("archive error at {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    /// internal error that shouldn't happen, including recovered panics
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the file or path doesn't exist
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::FileNotFound(_) => true,
            StorageError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
