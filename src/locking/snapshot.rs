// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Physical snapshot copies backing `ImmutableRead` locks.
//!
//! The lock table decides when a copy is needed and when the last reader is
//! gone; a `SnapshotStorage` only materializes and deletes the copies.

use crate::config::LockingConfig;
use crate::error::{LockError, Result};
use crate::locking::resource::ResourceUri;
use log::debug;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// File suffix carried by every snapshot copy.
pub(crate) const SNAPSHOT_SUFFIX: &str = ".snapshot";

/// Creates and removes point-in-time copies of resources.
pub trait SnapshotStorage: Send + Sync {
    /// Copies the current content of `resource` and returns the location of the copy.
    fn create_snapshot(&self, resource: &ResourceUri, generation: u64) -> Result<ResourceUri>;

    /// Removes a copy previously returned by `create_snapshot`.
    fn delete_snapshot(&self, snapshot: &ResourceUri) -> Result<()>;
}

/// Snapshot storage that copies files into a dedicated directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStorage {
    resource_root: PathBuf,
    snapshot_dir: PathBuf,
}

impl FileSnapshotStorage {
    pub fn new<R: Into<PathBuf>, S: Into<PathBuf>>(resource_root: R, snapshot_dir: S) -> Self {
        Self {
            resource_root: resource_root.into(),
            snapshot_dir: snapshot_dir.into(),
        }
    }

    pub fn from_config(config: &LockingConfig) -> Self {
        Self::new(config.resource_root.clone(), config.snapshot_dir.clone())
    }

    pub fn resource_root(&self) -> &Path {
        &self.resource_root
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    fn snapshot_error(resource: &ResourceUri, details: String) -> LockError {
        LockError::Snapshot {
            resource: resource.to_string(),
            details,
        }
    }
}

impl SnapshotStorage for FileSnapshotStorage {
    fn create_snapshot(&self, resource: &ResourceUri, generation: u64) -> Result<ResourceUri> {
        let source = resource.to_path(&self.resource_root);
        fs::create_dir_all(&self.snapshot_dir).map_err(|err| {
            Self::snapshot_error(
                resource,
                format!(
                    "Failed to create snapshot directory {}: {err}",
                    self.snapshot_dir.display()
                ),
            )
        })?;

        let prefix = format!("{}.g{generation}.", snapshot_stem(&source));
        let mut staged = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(SNAPSHOT_SUFFIX)
            .tempfile_in(&self.snapshot_dir)
            .map_err(|err| {
                Self::snapshot_error(resource, format!("Failed to allocate snapshot file: {err}"))
            })?;

        let mut reader = File::open(&source).map_err(|err| {
            Self::snapshot_error(
                resource,
                format!("Failed to open {} for copying: {err}", source.display()),
            )
        })?;
        io::copy(&mut reader, staged.as_file_mut()).map_err(|err| {
            Self::snapshot_error(
                resource,
                format!("Failed to copy {}: {err}", source.display()),
            )
        })?;

        let (file, path) = staged.keep().map_err(|err| {
            Self::snapshot_error(resource, format!("Failed to keep snapshot file: {err}"))
        })?;
        let mut permissions = file.metadata()?.permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions)?;

        debug!(
            "Created snapshot {} of {resource} (generation {generation})",
            path.display()
        );
        Ok(ResourceUri::from_path(&path))
    }

    fn delete_snapshot(&self, snapshot: &ResourceUri) -> Result<()> {
        let path = snapshot.to_path(&self.snapshot_dir);
        match remove_snapshot_file(&path) {
            Ok(true) => {
                debug!("Deleted snapshot {}", path.display());
                Ok(())
            }
            Ok(false) => {
                debug!("Snapshot {} was already gone", path.display());
                Ok(())
            }
            Err(err) => Err(Self::snapshot_error(
                snapshot,
                format!("Failed to delete {}: {err}", path.display()),
            )),
        }
    }
}

/// Removes a snapshot file, returning `false` when it did not exist.
pub(crate) fn remove_snapshot_file(path: &Path) -> io::Result<bool> {
    #[cfg(windows)]
    {
        if let Ok(metadata) = fs::metadata(path) {
            let mut permissions = metadata.permissions();
            permissions.set_readonly(false);
            fs::set_permissions(path, permissions)?;
        }
    }

    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

pub(crate) fn is_snapshot_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(SNAPSHOT_SUFFIX))
}

fn snapshot_stem(source: &Path) -> String {
    let stem: String = source
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("resource")
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "resource".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage_with_resource(content: &str) -> (TempDir, FileSnapshotStorage, ResourceUri) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("metadata");
        fs::create_dir_all(root.join("4711")).unwrap();
        fs::write(root.join("4711").join("meta.xml"), content).unwrap();
        let storage = FileSnapshotStorage::new(root, temp.path().join("snapshots"));
        (temp, storage, ResourceUri::new("4711/meta.xml"))
    }

    #[test]
    fn snapshot_copies_current_content() {
        let (_temp, storage, resource) = storage_with_resource("<mets/>");

        let snapshot = storage.create_snapshot(&resource, 3).unwrap();
        let path = snapshot.to_path(storage.snapshot_dir());

        assert!(path.starts_with(storage.snapshot_dir()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "<mets/>");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("meta.xml.g3."));
        assert!(is_snapshot_file(&path));
        assert!(fs::metadata(&path).unwrap().permissions().readonly());
    }

    #[test]
    fn snapshots_of_same_generation_get_unique_names() {
        let (_temp, storage, resource) = storage_with_resource("x");

        let first = storage.create_snapshot(&resource, 0).unwrap();
        let second = storage.create_snapshot(&resource, 0).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn snapshot_is_independent_of_later_writes() {
        let (_temp, storage, resource) = storage_with_resource("before");

        let snapshot = storage.create_snapshot(&resource, 0).unwrap();
        fs::write(resource.to_path(storage.resource_root()), "after").unwrap();

        let path = snapshot.to_path(storage.snapshot_dir());
        assert_eq!(fs::read_to_string(path).unwrap(), "before");
    }

    #[test]
    fn delete_removes_file_and_tolerates_missing() {
        let (_temp, storage, resource) = storage_with_resource("x");

        let snapshot = storage.create_snapshot(&resource, 0).unwrap();
        storage.delete_snapshot(&snapshot).unwrap();
        assert!(!snapshot.to_path(storage.snapshot_dir()).exists());
        storage.delete_snapshot(&snapshot).unwrap();
    }

    #[test]
    fn missing_source_reports_snapshot_error() {
        let (_temp, storage, _) = storage_with_resource("x");

        let err = storage
            .create_snapshot(&ResourceUri::new("missing.xml"), 0)
            .unwrap_err();
        match err {
            LockError::Snapshot { resource, details } => {
                assert_eq!(resource, "missing.xml");
                assert!(details.contains("Failed to open"));
            }
            other => panic!("Expected snapshot error, got {other:?}"),
        }
        assert_eq!(fs::read_dir(storage.snapshot_dir()).unwrap().count(), 0);
    }

    #[test]
    fn stem_is_sanitized() {
        assert_eq!(snapshot_stem(Path::new("/a/b c?.xml")), "b_c_.xml");
        assert_eq!(snapshot_stem(Path::new("/")), "resource");
    }
}
