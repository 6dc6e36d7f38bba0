//! structured-file codec: one save/load pair over three wire formats.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::storage::errors::{StorageError, StorageResult};

/// on-disk serialization format, doubling as the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Yaml,
    Json,
    Xml,
}

impl Format {
    /// the file extension written for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
            Format::Xml => "xml",
        }
    }

    /// resolve a format from a file extension or flag value
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            "xml" => Some(Format::Xml),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Serialize a value into the file at `path`.
///
/// An existing target is deleted before the new content is written, so
/// the file is always a whole snapshot and never a patched-in-place mix
/// of old and new content.
pub fn save<T: Serialize>(path: &Path, value: &T, format: Format) -> StorageResult<()> {
    let content = encode(value, format).map_err(|reason| StorageError::Encode {
        path: path.to_path_buf(),
        reason,
    })?;
    if path.exists() {
        fs::remove_file(path)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// deserialize the file at `path` into a value of the target shape
pub fn load<T: DeserializeOwned>(path: &Path, format: Format) -> StorageResult<T> {
    if !path.is_file() {
        return Err(StorageError::FileNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    decode(&content, format).map_err(|reason| StorageError::Decode {
        path: path.to_path_buf(),
        reason,
    })
}

fn encode<T: Serialize>(value: &T, format: Format) -> Result<String, String> {
    match format {
        Format::Yaml => serde_yaml_ng::to_string(value).map_err(|e| e.to_string()),
        Format::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
        Format::Xml => quick_xml::se::to_string(value).map_err(|e| e.to_string()),
    }
}

fn decode<T: DeserializeOwned>(content: &str, format: Format) -> Result<T, String> {
    match format {
        Format::Yaml => serde_yaml_ng::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        Format::Xml => quick_xml::de::from_str(content).map_err(|e| e.to_string()),
    }
}
