//! directory compression and decompression for repository backups, in
//! zip and tar+gzip flavors.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::storage::errors::{StorageError, StorageResult};

/// archive container format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// conventional file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

/// Compress a directory into an archive file.
///
/// One entry is written per regular file, with paths relative to the
/// source directory placed under a single top-level directory named
/// after it. Directories carrying no files leave no trace in the
/// archive.
pub fn compress(source_dir: &Path, target_file: &Path, format: ArchiveFormat) -> StorageResult<()> {
    if !source_dir.is_dir() {
        return Err(StorageError::FileNotFound(source_dir.to_path_buf()));
    }
    let base = dir_basename(source_dir)?;
    match format {
        ArchiveFormat::Zip => zip_compress(source_dir, &base, target_file),
        ArchiveFormat::TarGz => tar_compress(source_dir, &base, target_file),
    }
}

/// Decompress an archive into a directory, creating it if absent.
///
/// Structure and contents are recreated verbatim; unix mode bits are
/// restored where the platform supports them.
pub fn decompress(
    archive_file: &Path,
    target_dir: &Path,
    format: ArchiveFormat,
) -> StorageResult<()> {
    if !archive_file.is_file() {
        return Err(StorageError::FileNotFound(archive_file.to_path_buf()));
    }
    fs::create_dir_all(target_dir)?;
    match format {
        ArchiveFormat::Zip => zip_decompress(archive_file, target_dir),
        ArchiveFormat::TarGz => tar_decompress(archive_file, target_dir),
    }
}

fn dir_basename(dir: &Path) -> StorageResult<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| StorageError::Archive {
            path: dir.to_path_buf(),
            reason: "source directory has no usable base name".to_string(),
        })
}

/// join a relative path onto an entry-name prefix with forward slashes
fn entry_name(base: &str, rel: &Path) -> String {
    let mut name = String::from(base);
    for part in rel.components() {
        name.push('/');
        name.push_str(&part.as_os_str().to_string_lossy());
    }
    name
}

fn zip_compress(source_dir: &Path, base: &str, target_file: &Path) -> StorageResult<()> {
    let file = File::create(target_file)?;
    let mut zip = ZipWriter::new(file);

    for entry in WalkDir::new(source_dir) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| StorageError::Archive {
                path: entry.path().to_path_buf(),
                reason: e.to_string(),
            })?;

        #[allow(unused_mut)]
        let mut options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = entry.metadata().map_err(io::Error::from)?;
            options = options.unix_permissions(metadata.permissions().mode());
        }

        zip.start_file(entry_name(base, rel), options)
            .map_err(|e| zip_error(target_file, e))?;
        let mut src = File::open(entry.path())?;
        io::copy(&mut src, &mut zip)?;
    }

    zip.finish().map_err(|e| zip_error(target_file, e))?;
    Ok(())
}

fn zip_decompress(archive_file: &Path, target_dir: &Path) -> StorageResult<()> {
    let file = File::open(archive_file)?;
    let mut archive = ZipArchive::new(file).map_err(|e| zip_error(archive_file, e))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| zip_error(archive_file, e))?;
        let Some(rel) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            return Err(StorageError::Archive {
                path: archive_file.to_path_buf(),
                reason: format!("entry '{}' escapes the target directory", entry.name()),
            });
        };
        let dest = target_dir.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&dest)?;
        io::copy(&mut entry, &mut out)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&dest, fs::Permissions::from_mode(mode))?;
            }
        }
    }
    Ok(())
}

fn tar_compress(source_dir: &Path, base: &str, target_file: &Path) -> StorageResult<()> {
    let file = File::create(target_file)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut tar = tar::Builder::new(encoder);

    for entry in WalkDir::new(source_dir) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| StorageError::Archive {
                path: entry.path().to_path_buf(),
                reason: e.to_string(),
            })?;
        tar.append_path_with_name(entry.path(), PathBuf::from(base).join(rel))?;
    }

    tar.finish()?;
    let encoder = tar.into_inner()?;
    encoder.finish()?;
    Ok(())
}

fn tar_decompress(archive_file: &Path, target_dir: &Path) -> StorageResult<()> {
    let file = File::open(archive_file)?;
    let decoder = GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    archive.set_preserve_permissions(true);
    archive.unpack(target_dir).map_err(|e| StorageError::Archive {
        path: archive_file.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(())
}

fn zip_error(path: &Path, err: zip::result::ZipError) -> StorageError {
    StorageError::Archive {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use super::*;

    /// build a small tree: a root file, a nested file and an empty dir
    fn build_source(root: &Path) -> PathBuf {
        let source = root.join("backup-src");
        fs::create_dir_all(source.join("charts")).unwrap();
        fs::create_dir_all(source.join("empty")).unwrap();
        fs::write(source.join("index.yaml"), "name: demo\n").unwrap();
        fs::write(source.join("charts").join("index.yaml"), "charts: []\n").unwrap();
        source
    }

    fn collect_files(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        for entry in WalkDir::new(dir) {
            let entry = entry.unwrap();
            if entry.file_type().is_file() {
                let rel = entry.path().strip_prefix(dir).unwrap().to_path_buf();
                files.insert(rel, fs::read(entry.path()).unwrap());
            }
        }
        files
    }

    #[test]
    fn test_zip_round_trip() {
        let dir = TempDir::new().unwrap();
        let source = build_source(dir.path());
        let archive = dir.path().join("backup.zip");
        compress(&source, &archive, ArchiveFormat::Zip).unwrap();

        // every entry sits under the source basename, no dir entries
        let mut names: Vec<String> = {
            let zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
            zip.file_names().map(|n| n.to_string()).collect()
        };
        names.sort();
        assert_eq!(
            names,
            vec!["backup-src/charts/index.yaml", "backup-src/index.yaml"]
        );

        let restored = dir.path().join("restored");
        decompress(&archive, &restored, ArchiveFormat::Zip).unwrap();
        assert_eq!(
            collect_files(&restored.join("backup-src")),
            collect_files(&source)
        );
    }

    #[test]
    fn test_targz_round_trip() {
        let dir = TempDir::new().unwrap();
        let source = build_source(dir.path());
        let archive = dir.path().join("backup.tar.gz");
        compress(&source, &archive, ArchiveFormat::TarGz).unwrap();

        let restored = dir.path().join("restored");
        decompress(&archive, &restored, ArchiveFormat::TarGz).unwrap();
        assert_eq!(
            collect_files(&restored.join("backup-src")),
            collect_files(&source)
        );
        // the empty directory carried no entry
        assert!(!restored.join("backup-src").join("empty").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_modes_survive_round_trip() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let source = build_source(dir.path());
        let script = source.join("hook.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        for (format, name) in [(ArchiveFormat::Zip, "m.zip"), (ArchiveFormat::TarGz, "m.tar.gz")] {
            let archive = dir.path().join(name);
            compress(&source, &archive, format).unwrap();
            let restored = dir.path().join(format!("restored-{}", name));
            decompress(&archive, &restored, format).unwrap();

            let mode = fs::metadata(restored.join("backup-src").join("hook.sh"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_malformed_archives() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("bogus.zip");
        fs::write(&bogus, "this is not an archive").unwrap();

        let err = decompress(&bogus, &dir.path().join("out"), ArchiveFormat::Zip).unwrap_err();
        assert!(matches!(err, StorageError::Archive { .. }));

        let err = decompress(&bogus, &dir.path().join("out2"), ArchiveFormat::TarGz).unwrap_err();
        assert!(matches!(err, StorageError::Archive { .. }));
    }

    #[test]
    fn test_compress_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = compress(
            &dir.path().join("absent"),
            &dir.path().join("out.zip"),
            ArchiveFormat::Zip,
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_decompress_creates_target_dir() {
        let dir = TempDir::new().unwrap();
        let source = build_source(dir.path());
        let archive = dir.path().join("deep.zip");
        compress(&source, &archive, ArchiveFormat::Zip).unwrap();

        let nested = dir.path().join("a").join("b").join("c");
        decompress(&archive, &nested, ArchiveFormat::Zip).unwrap();
        assert!(nested.join("backup-src").join("index.yaml").is_file());
    }
}
