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

use crate::config::LockingConfig;
use crate::error::{LockError, Result};
use crate::locking::access::GrantedAccess;
use crate::locking::request::LockRequest;
use crate::locking::resource::ResourceUri;
use crate::locking::result::{ConflictMap, DeniedAccess, LockingResult};
use crate::locking::snapshot::{FileSnapshotStorage, SnapshotStorage};
use crate::locking::stream::{StreamDirection, StreamGuard};
use crate::locking::table::{Acquisition, LockInfo, LockTable};
use log::{debug, info};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// State shared by a manager, its grants and their guarded streams.
pub(crate) struct Shared {
    table: Mutex<LockTable>,
    storage: Arc<dyn SnapshotStorage>,
}

impl Shared {
    pub(crate) fn table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn storage(&self) -> &dyn SnapshotStorage {
        self.storage.as_ref()
    }
}

/// Arbiter of concurrent access to resources.
///
/// Requests are answered immediately: compatible requests are granted, the
/// rest are denied with the names of the blocking holders. Cloning yields
/// another handle on the same lock table.
#[derive(Clone)]
pub struct LockManagement {
    shared: Arc<Shared>,
}

impl LockManagement {
    pub fn new(storage: Arc<dyn SnapshotStorage>) -> Self {
        Self {
            shared: Arc::new(Shared {
                table: Mutex::new(LockTable::default()),
                storage,
            }),
        }
    }

    /// Builds a manager that keeps snapshots as files, as configured.
    pub fn from_config(config: &LockingConfig) -> Self {
        Self::new(Arc::new(FileSnapshotStorage::from_config(config)))
    }

    /// Requests all resources of `request` at once.
    ///
    /// When `previous` is an active grant of the same user, the request
    /// extends it and the same grant is returned. Otherwise a new grant is
    /// created. Either every lock is installed or, on conflict, none is.
    pub fn try_lock(
        &self,
        request: LockRequest,
        previous: Option<&LockingResult>,
    ) -> Result<LockingResult> {
        let (owner, resources) = request.into_parts();
        let mut table = self.shared.table();
        let extended = match previous {
            Some(LockingResult::Granted(access))
                if access.owner() == owner
                    && access.belongs_to(&self.shared)
                    && table.is_active(access.grant_id()) =>
            {
                Some(access)
            }
            _ => None,
        };
        let acquisition = table.acquire(
            extended.map(GrantedAccess::grant_id),
            &owner,
            &resources,
            self.shared.storage(),
        )?;
        drop(table);

        match (acquisition, extended) {
            (Acquisition::Granted(id), Some(access)) => {
                debug!(
                    "Extended grant {id} of {owner} by {} resource(s)",
                    resources.len()
                );
                Ok(LockingResult::Granted(access.clone()))
            }
            (Acquisition::Granted(id), None) => {
                debug!(
                    "Granted {} resource(s) to {owner} as grant {id}",
                    resources.len()
                );
                Ok(LockingResult::Granted(GrantedAccess::new(
                    id,
                    owner,
                    self.shared.clone(),
                )))
            }
            (Acquisition::Denied(conflicts), _) => Ok(self.deny(&owner, conflicts)),
        }
    }

    fn deny(&self, owner: &str, conflicts: ConflictMap) -> LockingResult {
        let denied = DeniedAccess::new(conflicts);
        info!(
            "Lock request of {owner} denied: {}",
            denied.to_string().replace('\n', "; ")
        );
        LockingResult::Denied(denied)
    }

    /// Returns the location to open for `resource`: the snapshot copy for
    /// immutable readers, the resource itself otherwise.
    pub fn check_permission(
        &self,
        result: &LockingResult,
        resource: &ResourceUri,
        for_write: bool,
    ) -> Result<ResourceUri> {
        match result {
            LockingResult::Granted(access) => {
                self.ensure_owned(access, resource)?;
                access.check_permission(resource, for_write)
            }
            LockingResult::Denied(_) => Err(LockError::access_denied(
                resource,
                "the lock request was denied",
            )),
        }
    }

    /// Registers a stream opened on `resource` under `access` and returns the
    /// guard that must be used (and closed) in its place.
    pub fn report_grant<S>(
        &self,
        resource: &ResourceUri,
        stream: S,
        access: &GrantedAccess,
        direction: StreamDirection,
    ) -> Result<StreamGuard<S>> {
        self.ensure_owned(access, resource)?;
        access.report_grant(resource, stream, direction)
    }

    pub fn report_read<S>(
        &self,
        resource: &ResourceUri,
        stream: S,
        access: &GrantedAccess,
    ) -> Result<StreamGuard<S>> {
        self.report_grant(resource, stream, access, StreamDirection::Read)
    }

    pub fn report_write<S>(
        &self,
        resource: &ResourceUri,
        stream: S,
        access: &GrantedAccess,
    ) -> Result<StreamGuard<S>> {
        self.report_grant(resource, stream, access, StreamDirection::Write)
    }

    /// Drops every lock and snapshot. Outstanding grants become inert.
    pub fn clear(&self) {
        self.shared.table().clear(self.shared.storage());
        debug!("Lock table cleared");
    }

    /// Names of the users holding any lock on `resource`.
    pub fn holders(&self, resource: &ResourceUri) -> BTreeSet<String> {
        self.shared.table().holders(resource)
    }

    /// All active locks, ordered by resource and owner.
    pub fn lock_report(&self) -> Vec<LockInfo> {
        self.shared.table().report()
    }

    /// Number of snapshot copies currently alive.
    pub fn snapshot_count(&self) -> usize {
        self.shared.table().snapshot_count()
    }

    /// Content generation of `resource`, bumped by every completed write.
    pub fn generation(&self, resource: &ResourceUri) -> u64 {
        self.shared.table().generation(resource)
    }

    fn ensure_owned(&self, access: &GrantedAccess, resource: &ResourceUri) -> Result<()> {
        if access.belongs_to(&self.shared) {
            Ok(())
        } else {
            Err(LockError::access_denied(
                resource,
                "the granted access was issued by a different lock manager",
            ))
        }
    }
}

impl fmt::Debug for LockManagement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManagement")
            .field("locks", &self.shared.table().report().len())
            .finish()
    }
}
