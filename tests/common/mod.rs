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

#![allow(dead_code)]

use lockwarden::config::LockingConfig;
use lockwarden::locking::{GrantedAccess, LockManagement, LockRequest, LockingMode, ResourceUri};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A resource root and a snapshot directory inside one temporary directory.
pub struct TestWorkspace {
    _temp: TempDir,
    resource_root: PathBuf,
    snapshot_dir: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let resource_root = temp.path().join("metadata");
        let snapshot_dir = temp.path().join("snapshots");
        fs::create_dir_all(&resource_root).expect("Failed to create resource root");

        Self {
            _temp: temp,
            resource_root,
            snapshot_dir,
        }
    }

    pub fn config(&self) -> LockingConfig {
        LockingConfig {
            resource_root: self.resource_root.clone(),
            snapshot_dir: self.snapshot_dir.clone(),
            hygiene_age_secs: 0,
        }
    }

    pub fn manager(&self) -> LockManagement {
        LockManagement::from_config(&self.config())
    }

    /// Writes `content` to a resource below the root and returns its URI.
    pub fn resource(&self, name: &str, content: &str) -> ResourceUri {
        fs::write(self.resource_root.join(name), content).expect("Failed to write resource");
        ResourceUri::new(name)
    }

    pub fn path_of(&self, uri: &ResourceUri) -> PathBuf {
        uri.to_path(&self.resource_root)
    }

    pub fn read(&self, uri: &ResourceUri) -> String {
        fs::read_to_string(self.path_of(uri)).expect("Failed to read resource")
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Number of snapshot copies currently on disk.
    pub fn snapshot_files(&self) -> usize {
        match fs::read_dir(&self.snapshot_dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_name().to_string_lossy().ends_with(".snapshot"))
                .count(),
            Err(_) => 0,
        }
    }
}

/// Requests `resources` for `owner` and panics unless the request is granted.
pub fn grant(
    manager: &LockManagement,
    owner: &str,
    resources: &[(&ResourceUri, LockingMode)],
) -> GrantedAccess {
    let request = resources
        .iter()
        .fold(LockRequest::new(owner), |request, (resource, mode)| {
            request.with(*resource, *mode)
        });
    manager
        .try_lock(request, None)
        .unwrap()
        .into_granted()
        .unwrap_or_else(|| panic!("expected {owner} to be granted {resources:?}"))
}
