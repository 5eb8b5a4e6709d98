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

use crate::locking::access::GrantedAccess;
use crate::locking::resource::ResourceUri;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Conflicting resources mapped to the users holding the blocking locks.
pub type ConflictMap = BTreeMap<ResourceUri, BTreeSet<String>>;

/// A refused lock request. Carries no locks, only who is in the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeniedAccess {
    conflicts: ConflictMap,
}

impl DeniedAccess {
    pub(crate) fn new(conflicts: ConflictMap) -> Self {
        Self { conflicts }
    }

    pub fn conflicts(&self) -> &ConflictMap {
        &self.conflicts
    }

    pub fn conflicting_resources(&self) -> impl Iterator<Item = &ResourceUri> {
        self.conflicts.keys()
    }

    pub fn holders_of(&self, resource: &ResourceUri) -> Option<&BTreeSet<String>> {
        self.conflicts.get(resource)
    }
}

impl fmt::Display for DeniedAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (resource, holders) in &self.conflicts {
            if !first {
                writeln!(f)?;
            }
            first = false;
            let names: Vec<&str> = holders.iter().map(String::as_str).collect();
            write!(f, "{resource} is locked by {}", names.join(", "))?;
        }
        Ok(())
    }
}

/// Outcome of `LockManagement::try_lock`.
#[derive(Debug, Clone)]
pub enum LockingResult {
    Granted(GrantedAccess),
    Denied(DeniedAccess),
}

impl LockingResult {
    pub fn is_granted(&self) -> bool {
        matches!(self, LockingResult::Granted(_))
    }

    pub fn granted(&self) -> Option<&GrantedAccess> {
        match self {
            LockingResult::Granted(access) => Some(access),
            LockingResult::Denied(_) => None,
        }
    }

    pub fn into_granted(self) -> Option<GrantedAccess> {
        match self {
            LockingResult::Granted(access) => Some(access),
            LockingResult::Denied(_) => None,
        }
    }

    pub fn denied(&self) -> Option<&DeniedAccess> {
        match self {
            LockingResult::Granted(_) => None,
            LockingResult::Denied(denied) => Some(denied),
        }
    }

    /// The conflict map of a denial; empty for a grant.
    pub fn conflicts(&self) -> ConflictMap {
        self.denied()
            .map(|denied| denied.conflicts().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denial() -> DeniedAccess {
        let mut conflicts = ConflictMap::new();
        conflicts.insert(
            ResourceUri::new("issue.xml"),
            BTreeSet::from(["bob".to_string(), "alice".to_string()]),
        );
        conflicts.insert(
            ResourceUri::new("year.xml"),
            BTreeSet::from(["carol".to_string()]),
        );
        DeniedAccess::new(conflicts)
    }

    #[test]
    fn display_lists_holders_per_resource() {
        assert_eq!(
            denial().to_string(),
            "issue.xml is locked by alice, bob\nyear.xml is locked by carol"
        );
    }

    #[test]
    fn accessors_expose_conflicts() {
        let denied = denial();
        let resources: Vec<&str> = denied
            .conflicting_resources()
            .map(ResourceUri::as_str)
            .collect();
        assert_eq!(resources, ["issue.xml", "year.xml"]);
        assert!(
            denied
                .holders_of(&ResourceUri::new("year.xml"))
                .unwrap()
                .contains("carol")
        );
        assert!(denied.holders_of(&ResourceUri::new("other.xml")).is_none());
    }

    #[test]
    fn denied_result_has_no_grant() {
        let result = LockingResult::Denied(denial());
        assert!(!result.is_granted());
        assert!(result.granted().is_none());
        assert_eq!(result.conflicts().len(), 2);
        assert!(result.into_granted().is_none());
    }
}
