//! Versioned package storage and ZIP archival.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;
use zip::ZipWriter;
use zip::write::FileOptions;

use crate::error::HarvestError;

/// Manages storage and archival of packages under a base directory.
///
/// Layout:
/// `<base>/<name>/<version>/<package>/` for directory archives and
/// `<base>/<name>/<name>-v<version>.zip` for ZIP archives.
pub struct PackageStorage {
    base_storage_path: PathBuf,
}

impl PackageStorage {
    pub fn new(base_storage_path: impl Into<PathBuf>) -> Result<Self, HarvestError> {
        let base_storage_path = base_storage_path.into();
        std::fs::create_dir_all(&base_storage_path)?;
        Ok(Self { base_storage_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_storage_path
    }

    /// Copy a package into the versioned archive tree and write
    /// `archive_metadata.json` beside it.
    pub fn archive_package(
        &self,
        package_path: &Path,
        version: &str,
        name: Option<&str>,
    ) -> Result<PathBuf, HarvestError> {
        let package_name = resolve_package_name(package_path, name)?;
        let archive_dir = self.base_storage_path.join(&package_name).join(version);
        std::fs::create_dir_all(&archive_dir)?;

        let target = archive_dir.join(
            package_path
                .file_name()
                .ok_or_else(|| invalid_package_path(package_path))?,
        );
        if package_path.is_dir() {
            copy_dir_recursive(package_path, &target)?;
        } else {
            std::fs::copy(package_path, &target)?;
        }

        let metadata = json!({
            "package_name": package_name,
            "version": version,
            "archived_at": OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            "source_path": package_path.display().to_string(),
        });
        std::fs::write(
            archive_dir.join("archive_metadata.json"),
            serde_json::to_string_pretty(&metadata)?,
        )?;

        info!(package = %target.display(), version, "archived package");
        Ok(target)
    }

    /// Produce `<base>/<name>/<name>-v<version>.zip` with entries relative
    /// to the package root.
    pub fn create_zip_archive(
        &self,
        package_path: &Path,
        version: &str,
        name: Option<&str>,
    ) -> Result<PathBuf, HarvestError> {
        let package_name = resolve_package_name(package_path, name)?;
        let archive_dir = self.base_storage_path.join(&package_name);
        std::fs::create_dir_all(&archive_dir)?;

        let zip_path = archive_dir.join(format!("{package_name}-v{version}.zip"));
        let mut writer = ZipWriter::new(File::create(&zip_path)?);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        if package_path.is_dir() {
            let mut entries = Vec::new();
            collect_files(package_path, &mut entries)?;
            entries.sort();
            for file_path in entries {
                let relative = file_path
                    .strip_prefix(package_path)
                    .map_err(|_| invalid_package_path(&file_path))?;
                writer.start_file(relative.to_string_lossy().replace('\\', "/"), options)?;
                let mut contents = Vec::new();
                File::open(&file_path)?.read_to_end(&mut contents)?;
                writer.write_all(&contents)?;
            }
        } else {
            let file_name = package_path
                .file_name()
                .ok_or_else(|| invalid_package_path(package_path))?;
            writer.start_file(file_name.to_string_lossy(), options)?;
            let mut contents = Vec::new();
            File::open(package_path)?.read_to_end(&mut contents)?;
            writer.write_all(&contents)?;
        }
        writer.finish()?;

        info!(archive = %zip_path.display(), "created zip archive");
        Ok(zip_path)
    }

    /// Versions of a package, sorted lexicographically.
    pub fn list_versions(&self, package_name: &str) -> Result<Vec<String>, HarvestError> {
        let package_dir = self.base_storage_path.join(package_name);
        if !package_dir.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&package_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                versions.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// Latest version of a package, or `None` for unknown packages.
    pub fn latest_version(&self, package_name: &str) -> Result<Option<String>, HarvestError> {
        Ok(self.list_versions(package_name)?.pop())
    }
}

fn resolve_package_name(package_path: &Path, name: Option<&str>) -> Result<String, HarvestError> {
    match name {
        Some(name) if !name.trim().is_empty() => Ok(name.trim().to_string()),
        _ => package_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| invalid_package_path(package_path)),
    }
}

fn invalid_package_path(path: &Path) -> HarvestError {
    HarvestError::Package(format!("Invalid package path: {}", path.display()))
}

fn copy_dir_recursive(source: &Path, target: &Path) -> Result<(), HarvestError> {
    std::fs::create_dir_all(target)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let entry_target = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &entry_target)?;
        } else {
            std::fs::copy(entry.path(), &entry_target)?;
        }
    }
    Ok(())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), HarvestError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            collect_files(&entry.path(), out)?;
        } else {
            out.push(entry.path());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::ZipArchive;

    fn sample_package(dir: &Path) -> PathBuf {
        let package = dir.join("med13-resource");
        std::fs::create_dir_all(package.join("data")).expect("mkdir");
        std::fs::write(package.join("ro-crate-metadata.json"), "{}").expect("write");
        std::fs::write(package.join("data/genes_normalized.json"), "[]").expect("write");
        package
    }

    #[test]
    fn archive_package_copies_tree_and_writes_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = PackageStorage::new(dir.path().join("storage")).expect("storage");
        let package = sample_package(dir.path());

        let archived = storage
            .archive_package(&package, "1.0.0", Some("med13"))
            .expect("archived");

        assert!(archived.ends_with("med13-resource"));
        assert!(archived.join("data/genes_normalized.json").exists());

        let metadata_path = dir
            .path()
            .join("storage/med13/1.0.0/archive_metadata.json");
        let metadata: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(metadata_path).expect("read"))
                .expect("json");
        assert_eq!(metadata["package_name"], "med13");
        assert_eq!(metadata["version"], "1.0.0");
        assert!(metadata["archived_at"].as_str().is_some());
    }

    #[test]
    fn zip_archive_preserves_relative_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = PackageStorage::new(dir.path().join("storage")).expect("storage");
        let package = sample_package(dir.path());

        let zip_path = storage
            .create_zip_archive(&package, "1.2.0", Some("med13"))
            .expect("zip");
        assert!(zip_path.ends_with("med13/med13-v1.2.0.zip"));

        let mut archive = ZipArchive::new(File::open(&zip_path).expect("open")).expect("zip");
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).expect("entry").name().to_string())
            .collect();
        assert!(names.contains(&"ro-crate-metadata.json".to_string()));
        assert!(names.contains(&"data/genes_normalized.json".to_string()));
    }

    #[test]
    fn versions_sort_lexicographically() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = PackageStorage::new(dir.path().join("storage")).expect("storage");
        let package = sample_package(dir.path());

        for version in ["1.10.0", "1.2.0", "1.0.0"] {
            storage
                .archive_package(&package, version, Some("med13"))
                .expect("archived");
        }

        let versions = storage.list_versions("med13").expect("versions");
        assert_eq!(versions, vec!["1.0.0", "1.10.0", "1.2.0"]);
        assert_eq!(
            storage.latest_version("med13").expect("latest").as_deref(),
            Some("1.2.0")
        );
    }

    #[test]
    fn unknown_package_has_no_versions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = PackageStorage::new(dir.path().join("storage")).expect("storage");
        assert!(storage.list_versions("ghost").expect("versions").is_empty());
        assert!(storage.latest_version("ghost").expect("latest").is_none());
    }

    #[test]
    fn package_name_defaults_to_directory_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = PackageStorage::new(dir.path().join("storage")).expect("storage");
        let package = sample_package(dir.path());

        storage
            .archive_package(&package, "0.1.0", None)
            .expect("archived");
        assert_eq!(
            storage.list_versions("med13-resource").expect("versions"),
            vec!["0.1.0"]
        );
    }
}
