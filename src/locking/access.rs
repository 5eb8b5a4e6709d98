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

use crate::error::{Result, format_error_line};
use crate::locking::lock::GrantedLock;
use crate::locking::management::Shared;
use crate::locking::mode::LockingMode;
use crate::locking::resource::ResourceUri;
use crate::locking::result::ConflictMap;
use crate::locking::stream::{StreamDirection, StreamGuard};
use crate::locking::table::{Acquisition, GrantId};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// The set of locks one user holds, returned by a successful `try_lock`.
///
/// Clones share the same grant. The locks are released by `close`, or when the
/// last clone is dropped; guarded streams keep a clone alive until they close.
#[derive(Clone)]
pub struct GrantedAccess {
    handle: Arc<GrantHandle>,
}

struct GrantHandle {
    id: GrantId,
    owner: String,
    shared: Arc<Shared>,
}

impl GrantedAccess {
    pub(crate) fn new(id: GrantId, owner: String, shared: Arc<Shared>) -> Self {
        Self {
            handle: Arc::new(GrantHandle { id, owner, shared }),
        }
    }

    pub fn owner(&self) -> &str {
        &self.handle.owner
    }

    pub fn grant_id(&self) -> Uuid {
        self.handle.id
    }

    /// `false` once the grant has been closed or its manager cleared.
    pub fn is_active(&self) -> bool {
        self.shared().table().is_active(self.handle.id)
    }

    /// Extends this grant with more resources under the same all-or-nothing
    /// rules as `LockManagement::try_lock`. Returns an empty map on success;
    /// on conflict nothing changes and the blocking holders are returned.
    pub fn try_lock(&self, request: BTreeMap<ResourceUri, LockingMode>) -> Result<ConflictMap> {
        let shared = self.shared();
        let acquisition = shared.table().acquire(
            Some(self.handle.id),
            &self.handle.owner,
            &request,
            shared.storage(),
        )?;
        match acquisition {
            Acquisition::Granted(_) => {
                debug!(
                    "Extended grant of {} by {} resource(s)",
                    self.handle.owner,
                    request.len()
                );
                Ok(ConflictMap::new())
            }
            Acquisition::Denied(conflicts) => {
                debug!(
                    "Extension requested by {} conflicts on {} resource(s)",
                    self.handle.owner,
                    conflicts.len()
                );
                Ok(conflicts)
            }
        }
    }

    /// Releases every lock of this grant. Fails while any guarded stream
    /// obtained through this grant is still open. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let shared = self.shared();
        shared
            .table()
            .release_grant(self.handle.id, shared.storage())
    }

    pub fn get_lock(&self, resource: &ResourceUri) -> Option<GrantedLock> {
        self.shared().table().get_lock(self.handle.id, resource)
    }

    pub fn locks(&self) -> Vec<GrantedLock> {
        self.shared().table().locks_of(self.handle.id)
    }

    pub fn holds(&self, resource: &ResourceUri) -> bool {
        self.get_lock(resource).is_some()
    }

    pub fn open_streams(&self, resource: &ResourceUri) -> usize {
        self.shared().table().open_streams(self.handle.id, resource)
    }

    /// Resolves the location to open for reading or writing `resource`.
    pub fn check_permission(&self, resource: &ResourceUri, for_write: bool) -> Result<ResourceUri> {
        self.shared()
            .table()
            .check_permission(self.handle.id, resource, for_write)
    }

    /// Wraps a freshly opened stream so that its closure is reported back.
    pub fn report_grant<S>(
        &self,
        resource: &ResourceUri,
        stream: S,
        direction: StreamDirection,
    ) -> Result<StreamGuard<S>> {
        let pinned = self
            .shared()
            .table()
            .open_stream(self.handle.id, resource, direction)?;
        Ok(StreamGuard::new(
            stream,
            self.clone(),
            resource.clone(),
            direction,
            pinned,
        ))
    }

    pub(crate) fn close_stream(
        &self,
        resource: &ResourceUri,
        direction: StreamDirection,
        pinned: Option<u64>,
    ) {
        let shared = self.shared();
        shared.table().close_stream(
            self.handle.id,
            resource,
            direction,
            pinned,
            shared.storage(),
        );
    }

    pub(crate) fn belongs_to(&self, shared: &Arc<Shared>) -> bool {
        Arc::ptr_eq(&self.handle.shared, shared)
    }

    fn shared(&self) -> &Shared {
        &self.handle.shared
    }
}

impl fmt::Debug for GrantedAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantedAccess")
            .field("id", &self.handle.id)
            .field("owner", &self.handle.owner)
            .finish()
    }
}

impl Drop for GrantHandle {
    fn drop(&mut self) {
        let mut table = self.shared.table();
        if !table.is_active(self.id) {
            return;
        }
        match table.release_grant(self.id, self.shared.storage()) {
            Ok(()) => debug!("Released locks of {} on drop", self.owner),
            Err(err) => warn!(
                "Failed to release locks of {} on drop: {}",
                self.owner,
                format_error_line(&err)
            ),
        }
    }
}
