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

use crate::locking::mode::LockingMode;
use crate::locking::resource::ResourceUri;
use chrono::{DateTime, Utc};
use std::fmt;

/// One granted lock on one resource for one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    owner: String,
    resource: ResourceUri,
    mode: LockingMode,
    created_at: DateTime<Utc>,
}

impl Lock {
    pub(crate) fn new(
        owner: String,
        resource: ResourceUri,
        mode: LockingMode,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner,
            resource,
            mode,
            created_at,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn resource(&self) -> &ResourceUri {
        &self.resource
    }

    pub fn mode(&self) -> LockingMode {
        self.mode
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// An `ImmutableRead` lock together with the snapshot copy it reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmutableReadLock {
    lock: Lock,
    snapshot: ResourceUri,
    generation: u64,
}

impl ImmutableReadLock {
    pub(crate) fn new(lock: Lock, snapshot: ResourceUri, generation: u64) -> Self {
        Self {
            lock,
            snapshot,
            generation,
        }
    }

    pub fn lock(&self) -> &Lock {
        &self.lock
    }

    /// Location of the read-only copy shared by readers of the same generation.
    pub fn snapshot_uri(&self) -> &ResourceUri {
        &self.snapshot
    }

    /// Content generation of the resource when the snapshot was taken.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A lock as seen through a `GrantedAccess`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantedLock {
    Standard(Lock),
    ImmutableRead(ImmutableReadLock),
}

impl GrantedLock {
    pub fn lock(&self) -> &Lock {
        match self {
            GrantedLock::Standard(lock) => lock,
            GrantedLock::ImmutableRead(lock) => lock.lock(),
        }
    }

    pub fn owner(&self) -> &str {
        self.lock().owner()
    }

    pub fn resource(&self) -> &ResourceUri {
        self.lock().resource()
    }

    pub fn mode(&self) -> LockingMode {
        self.lock().mode()
    }

    pub fn snapshot_uri(&self) -> Option<&ResourceUri> {
        match self {
            GrantedLock::Standard(_) => None,
            GrantedLock::ImmutableRead(lock) => Some(lock.snapshot_uri()),
        }
    }

    pub fn as_immutable_read(&self) -> Option<&ImmutableReadLock> {
        match self {
            GrantedLock::Standard(_) => None,
            GrantedLock::ImmutableRead(lock) => Some(lock),
        }
    }
}

impl fmt::Display for GrantedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} held by {}",
            self.mode(),
            self.resource(),
            self.owner()
        )?;
        if let Some(snapshot) = self.snapshot_uri() {
            write!(f, " (snapshot {snapshot})")?;
        }
        Ok(())
    }
}
