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

//! The shared lock table.
//!
//! Every read-modify-write against the table happens while the caller holds
//! the table mutex owned by `LockManagement`, so each method here observes and
//! leaves a consistent state.

use crate::error::{LockError, Result, format_error_line};
use crate::locking::lock::{GrantedLock, ImmutableReadLock, Lock};
use crate::locking::mode::LockingMode;
use crate::locking::resource::ResourceUri;
use crate::locking::result::ConflictMap;
use crate::locking::snapshot::SnapshotStorage;
use crate::locking::stream::StreamDirection;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use uuid::Uuid;

pub(crate) type GrantId = Uuid;

/// Outcome of evaluating a request against the table.
#[derive(Debug)]
pub(crate) enum Acquisition {
    Granted(GrantId),
    Denied(ConflictMap),
}

/// Snapshot of one active lock, produced for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub owner: String,
    pub resource: ResourceUri,
    pub mode: LockingMode,
    pub created_at: DateTime<Utc>,
    pub open_streams: usize,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (owner: {}, mode: {}, since: {}, open streams: {})",
            self.resource,
            self.owner,
            self.mode,
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.open_streams
        )
    }
}

#[derive(Debug, Clone)]
struct SnapshotRef {
    generation: u64,
    uri: ResourceUri,
}

#[derive(Debug, Clone)]
struct HeldLock {
    mode: LockingMode,
    created_at: DateTime<Utc>,
    snapshot: Option<SnapshotRef>,
    read_since_grant: bool,
    upgrade_consumed: bool,
}

#[derive(Debug)]
struct GrantState {
    owner: String,
    locks: BTreeMap<ResourceUri, HeldLock>,
    open_streams: BTreeMap<ResourceUri, usize>,
}

#[derive(Debug)]
struct SnapshotSlot {
    uri: ResourceUri,
    references: usize,
}

#[derive(Debug, Default)]
struct ResourceEntry {
    holders: BTreeMap<GrantId, LockingMode>,
    open_writes: BTreeMap<GrantId, usize>,
    generation: u64,
    snapshots: BTreeMap<u64, SnapshotSlot>,
}

impl ResourceEntry {
    fn is_idle(&self) -> bool {
        self.holders.is_empty() && self.open_writes.is_empty() && self.snapshots.is_empty()
    }
}

#[derive(Debug, Default)]
pub(crate) struct LockTable {
    grants: HashMap<GrantId, GrantState>,
    resources: BTreeMap<ResourceUri, ResourceEntry>,
}

impl LockTable {
    /// Evaluates `request` for a new grant (`target == None`) or as an
    /// extension of an existing one, installing every lock or none.
    pub(crate) fn acquire(
        &mut self,
        target: Option<GrantId>,
        owner: &str,
        request: &BTreeMap<ResourceUri, LockingMode>,
        storage: &dyn SnapshotStorage,
    ) -> Result<Acquisition> {
        self.validate_request(target, request)?;

        let conflicts = self.find_conflicts(target, request);
        if !conflicts.is_empty() {
            return Ok(Acquisition::Denied(conflicts));
        }

        let mut snapshots = self.prepare_snapshots(request, storage)?;
        let id = match target {
            Some(id) => id,
            None => self.insert_grant(owner),
        };
        let now = Utc::now();
        for (resource, mode) in request {
            let snapshot = snapshots.remove(resource);
            self.install(id, resource, *mode, snapshot, now, storage);
        }
        Ok(Acquisition::Granted(id))
    }

    fn validate_request(
        &self,
        target: Option<GrantId>,
        request: &BTreeMap<ResourceUri, LockingMode>,
    ) -> Result<()> {
        let grant = match target {
            Some(id) => Some(self.grants.get(&id).ok_or_else(|| {
                let resource = request.keys().next().map(ToString::to_string);
                LockError::access_denied(
                    resource.unwrap_or_default(),
                    "the granted access has already been closed",
                )
            })?),
            None => None,
        };

        for (resource, mode) in request {
            if let Some(id) = target
                && !mode.allows_write()
                && self
                    .resources
                    .get(resource)
                    .is_some_and(|entry| entry.open_writes.contains_key(&id))
            {
                return Err(LockError::protocol_violation(
                    resource,
                    format!("cannot switch to {mode} while a write stream is open"),
                ));
            }
            if *mode != LockingMode::UpgradeWriteOnce {
                continue;
            }
            let held = grant
                .and_then(|grant| grant.locks.get(resource))
                .map(|held| held.mode);
            if !matches!(
                held,
                Some(LockingMode::UpgradeableRead | LockingMode::UpgradeWriteOnce)
            ) {
                return Err(LockError::protocol_violation(
                    resource,
                    "UPGRADE_WRITE_ONCE extends an UPGRADEABLE_READ lock held by the same grant",
                ));
            }
        }
        Ok(())
    }

    fn find_conflicts(
        &self,
        target: Option<GrantId>,
        request: &BTreeMap<ResourceUri, LockingMode>,
    ) -> ConflictMap {
        let mut conflicts = ConflictMap::new();
        for (resource, requested) in request {
            let Some(entry) = self.resources.get(resource) else {
                continue;
            };
            let mut blockers: BTreeSet<String> = entry
                .holders
                .iter()
                .filter(|(id, _)| Some(**id) != target)
                .filter(|(id, held)| {
                    !requested.is_compatible_with(**held, entry.open_writes.contains_key(*id))
                })
                .filter_map(|(id, _)| self.grants.get(id).map(|grant| grant.owner.clone()))
                .collect();
            if *requested == LockingMode::ImmutableRead {
                blockers.extend(
                    entry
                        .open_writes
                        .keys()
                        .filter(|id| Some(**id) != target)
                        .filter_map(|id| self.grants.get(id).map(|grant| grant.owner.clone())),
                );
            }
            if !blockers.is_empty() {
                conflicts.insert(resource.clone(), blockers);
            }
        }
        conflicts
    }

    /// Finds or creates the snapshot for every `ImmutableRead` entry. Copies
    /// created here are removed again if a later copy fails.
    fn prepare_snapshots(
        &self,
        request: &BTreeMap<ResourceUri, LockingMode>,
        storage: &dyn SnapshotStorage,
    ) -> Result<BTreeMap<ResourceUri, SnapshotRef>> {
        let mut prepared = BTreeMap::new();
        let mut created = Vec::new();

        for resource in request
            .iter()
            .filter(|(_, mode)| **mode == LockingMode::ImmutableRead)
            .map(|(resource, _)| resource)
        {
            let entry = self.resources.get(resource);
            let generation = entry.map_or(0, |entry| entry.generation);
            if let Some(slot) = entry.and_then(|entry| entry.snapshots.get(&generation)) {
                prepared.insert(
                    resource.clone(),
                    SnapshotRef {
                        generation,
                        uri: slot.uri.clone(),
                    },
                );
                continue;
            }

            match storage.create_snapshot(resource, generation) {
                Ok(uri) => {
                    created.push(uri.clone());
                    prepared.insert(resource.clone(), SnapshotRef { generation, uri });
                }
                Err(err) => {
                    for uri in &created {
                        if let Err(cleanup) = storage.delete_snapshot(uri) {
                            warn!(
                                "Failed to discard snapshot {uri} after aborted request: {}",
                                format_error_line(&cleanup)
                            );
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(prepared)
    }

    fn insert_grant(&mut self, owner: &str) -> GrantId {
        let id = Uuid::new_v4();
        self.grants.insert(
            id,
            GrantState {
                owner: owner.to_string(),
                locks: BTreeMap::new(),
                open_streams: BTreeMap::new(),
            },
        );
        id
    }

    fn install(
        &mut self,
        id: GrantId,
        resource: &ResourceUri,
        mode: LockingMode,
        snapshot: Option<SnapshotRef>,
        now: DateTime<Utc>,
        storage: &dyn SnapshotStorage,
    ) {
        let entry = self.resources.entry(resource.clone()).or_default();
        entry.holders.insert(id, mode);
        if let Some(snapshot) = &snapshot {
            entry
                .snapshots
                .entry(snapshot.generation)
                .or_insert_with(|| SnapshotSlot {
                    uri: snapshot.uri.clone(),
                    references: 0,
                })
                .references += 1;
        }

        let Some(grant) = self.grants.get_mut(&id) else {
            return;
        };
        let replaced = grant.locks.insert(
            resource.clone(),
            HeldLock {
                mode,
                created_at: now,
                snapshot,
                read_since_grant: false,
                upgrade_consumed: false,
            },
        );
        debug!("Granted {mode} on {resource} to {}", grant.owner);

        if let Some(previous) = replaced.and_then(|held| held.snapshot) {
            self.release_snapshot(resource, previous.generation, storage);
        }
    }

    /// Releases every lock of a grant. Refuses while the grant has open streams.
    pub(crate) fn release_grant(&mut self, id: GrantId, storage: &dyn SnapshotStorage) -> Result<()> {
        let Some(grant) = self.grants.get(&id) else {
            return Ok(());
        };
        let open: Vec<String> = grant
            .open_streams
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(resource, _)| resource.to_string())
            .collect();
        if !open.is_empty() {
            return Err(LockError::OpenStreams {
                owner: grant.owner.clone(),
                resources: open,
            });
        }

        let Some(grant) = self.grants.remove(&id) else {
            return Ok(());
        };
        let released = grant.locks.len();
        for (resource, held) in grant.locks {
            if let Some(entry) = self.resources.get_mut(&resource) {
                entry.holders.remove(&id);
            }
            if let Some(snapshot) = held.snapshot {
                self.release_snapshot(&resource, snapshot.generation, storage);
            }
            self.prune(&resource);
        }
        debug!("Released {released} lock(s) held by {}", grant.owner);
        Ok(())
    }

    pub(crate) fn check_permission(
        &mut self,
        id: GrantId,
        resource: &ResourceUri,
        for_write: bool,
    ) -> Result<ResourceUri> {
        let held = self
            .grants
            .get_mut(&id)
            .ok_or_else(|| {
                LockError::access_denied(resource, "the granted access has already been closed")
            })?
            .locks
            .get_mut(resource)
            .ok_or_else(|| LockError::access_denied(resource, "no lock is held on this resource"))?;

        if !for_write {
            held.read_since_grant = true;
            return Ok(held
                .snapshot
                .as_ref()
                .map_or_else(|| resource.clone(), |snapshot| snapshot.uri.clone()));
        }

        match held.mode {
            LockingMode::Exclusive => Ok(resource.clone()),
            LockingMode::UpgradeWriteOnce if held.upgrade_consumed => Err(
                LockError::access_denied(resource, "the one-shot write has already been used"),
            ),
            LockingMode::UpgradeWriteOnce if !held.read_since_grant => {
                Err(LockError::protocol_violation(
                    resource,
                    "the resource must be read again after the upgrade before it is written",
                ))
            }
            LockingMode::UpgradeWriteOnce => {
                held.upgrade_consumed = true;
                Ok(resource.clone())
            }
            LockingMode::ImmutableRead | LockingMode::UpgradeableRead => Err(
                LockError::access_denied(resource, format!("{} locks are read-only", held.mode)),
            ),
        }
    }

    /// Registers an opened stream. Returns the snapshot generation the stream
    /// pins when it reads from an immutable-read copy.
    pub(crate) fn open_stream(
        &mut self,
        id: GrantId,
        resource: &ResourceUri,
        direction: StreamDirection,
    ) -> Result<Option<u64>> {
        let grant = self.grants.get_mut(&id).ok_or_else(|| {
            LockError::access_denied(resource, "the granted access has already been closed")
        })?;
        let held = grant
            .locks
            .get(resource)
            .ok_or_else(|| LockError::access_denied(resource, "no lock is held on this resource"))?;

        let pinned = match direction {
            StreamDirection::Read => held.snapshot.as_ref().map(|snapshot| snapshot.generation),
            StreamDirection::Write => {
                let permitted = held.mode == LockingMode::Exclusive
                    || (held.mode == LockingMode::UpgradeWriteOnce && held.upgrade_consumed);
                if !permitted {
                    return Err(LockError::access_denied(
                        resource,
                        format!("no write permission has been checked out under {}", held.mode),
                    ));
                }
                None
            }
        };

        *grant.open_streams.entry(resource.clone()).or_insert(0) += 1;
        let entry = self.resources.entry(resource.clone()).or_default();
        if direction == StreamDirection::Write {
            *entry.open_writes.entry(id).or_insert(0) += 1;
        }
        if let Some(generation) = pinned
            && let Some(slot) = entry.snapshots.get_mut(&generation)
        {
            slot.references += 1;
        }
        Ok(pinned)
    }

    pub(crate) fn close_stream(
        &mut self,
        id: GrantId,
        resource: &ResourceUri,
        direction: StreamDirection,
        pinned: Option<u64>,
        storage: &dyn SnapshotStorage,
    ) {
        // Streams opened before `clear` refer to state that no longer exists.
        let Some(grant) = self.grants.get_mut(&id) else {
            return;
        };
        if let Some(count) = grant.open_streams.get_mut(resource) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                grant.open_streams.remove(resource);
            }
        }
        if direction == StreamDirection::Write {
            self.complete_write(id, resource);
        }
        if let Some(generation) = pinned {
            self.release_snapshot(resource, generation, storage);
        }
        self.prune(resource);
    }

    /// Bumps the content generation; once the grant's last write stream on the
    /// resource closes, a consumed upgrade falls back to `UpgradeableRead`.
    fn complete_write(&mut self, id: GrantId, resource: &ResourceUri) {
        let Some(entry) = self.resources.get_mut(resource) else {
            return;
        };
        let Some(count) = entry.open_writes.get_mut(&id) else {
            return;
        };
        *count = count.saturating_sub(1);
        let remaining = *count;
        entry.generation += 1;
        debug!(
            "Write to {resource} completed, now at generation {}",
            entry.generation
        );
        if remaining > 0 {
            return;
        }
        entry.open_writes.remove(&id);

        if let Some(grant) = self.grants.get_mut(&id)
            && let Some(held) = grant.locks.get_mut(resource)
            && held.mode == LockingMode::UpgradeWriteOnce
            && held.upgrade_consumed
        {
            held.mode = LockingMode::UpgradeableRead;
            held.upgrade_consumed = false;
            held.read_since_grant = false;
            entry.holders.insert(id, LockingMode::UpgradeableRead);
            debug!(
                "One-shot write on {resource} by {} consumed, lock is UPGRADEABLE_READ again",
                grant.owner
            );
        }
    }

    fn release_snapshot(
        &mut self,
        resource: &ResourceUri,
        generation: u64,
        storage: &dyn SnapshotStorage,
    ) {
        let Some(entry) = self.resources.get_mut(resource) else {
            return;
        };
        let Some(slot) = entry.snapshots.get_mut(&generation) else {
            return;
        };
        slot.references = slot.references.saturating_sub(1);
        if slot.references > 0 {
            return;
        }
        if let Some(slot) = entry.snapshots.remove(&generation) {
            match storage.delete_snapshot(&slot.uri) {
                Ok(()) => debug!(
                    "Last reader of {resource} generation {generation} left, removed {}",
                    slot.uri
                ),
                Err(err) => warn!(
                    "Failed to remove snapshot {} of {resource}: {}",
                    slot.uri,
                    format_error_line(&err)
                ),
            }
        }
    }

    fn prune(&mut self, resource: &ResourceUri) {
        if self.resources.get(resource).is_some_and(ResourceEntry::is_idle) {
            self.resources.remove(resource);
        }
    }

    /// Drops all state, deleting every live snapshot copy.
    pub(crate) fn clear(&mut self, storage: &dyn SnapshotStorage) {
        for (resource, entry) in std::mem::take(&mut self.resources) {
            for slot in entry.snapshots.into_values() {
                if let Err(err) = storage.delete_snapshot(&slot.uri) {
                    warn!(
                        "Failed to remove snapshot {} of {resource} while clearing: {}",
                        slot.uri,
                        format_error_line(&err)
                    );
                }
            }
        }
        self.grants.clear();
    }

    pub(crate) fn is_active(&self, id: GrantId) -> bool {
        self.grants.contains_key(&id)
    }

    pub(crate) fn open_streams(&self, id: GrantId, resource: &ResourceUri) -> usize {
        self.grants
            .get(&id)
            .and_then(|grant| grant.open_streams.get(resource))
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn get_lock(&self, id: GrantId, resource: &ResourceUri) -> Option<GrantedLock> {
        let grant = self.grants.get(&id)?;
        let held = grant.locks.get(resource)?;
        Some(granted_lock(&grant.owner, resource, held))
    }

    pub(crate) fn locks_of(&self, id: GrantId) -> Vec<GrantedLock> {
        self.grants
            .get(&id)
            .map(|grant| {
                grant
                    .locks
                    .iter()
                    .map(|(resource, held)| granted_lock(&grant.owner, resource, held))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn holders(&self, resource: &ResourceUri) -> BTreeSet<String> {
        self.resources
            .get(resource)
            .map(|entry| {
                entry
                    .holders
                    .keys()
                    .filter_map(|id| self.grants.get(id).map(|grant| grant.owner.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn generation(&self, resource: &ResourceUri) -> u64 {
        self.resources
            .get(resource)
            .map_or(0, |entry| entry.generation)
    }

    pub(crate) fn snapshot_count(&self) -> usize {
        self.resources
            .values()
            .map(|entry| entry.snapshots.len())
            .sum()
    }

    pub(crate) fn report(&self) -> Vec<LockInfo> {
        let mut report: Vec<LockInfo> = self
            .grants
            .values()
            .flat_map(|grant| {
                grant.locks.iter().map(|(resource, held)| LockInfo {
                    owner: grant.owner.clone(),
                    resource: resource.clone(),
                    mode: held.mode,
                    created_at: held.created_at,
                    open_streams: grant.open_streams.get(resource).copied().unwrap_or(0),
                })
            })
            .collect();
        report.sort_by(|a, b| {
            a.resource
                .cmp(&b.resource)
                .then_with(|| a.owner.cmp(&b.owner))
        });
        report
    }
}

fn granted_lock(owner: &str, resource: &ResourceUri, held: &HeldLock) -> GrantedLock {
    let lock = Lock::new(
        owner.to_string(),
        resource.clone(),
        held.mode,
        held.created_at,
    );
    match &held.snapshot {
        Some(snapshot) => GrantedLock::ImmutableRead(ImmutableReadLock::new(
            lock,
            snapshot.uri.clone(),
            snapshot.generation,
        )),
        None => GrantedLock::Standard(lock),
    }
}
