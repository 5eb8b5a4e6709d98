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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Access mode requested for a resource, ordered by increasing exclusivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockingMode {
    /// Read a point-in-time snapshot of the resource.
    ImmutableRead,
    /// Read the live resource, with the option to upgrade to a single write.
    UpgradeableRead,
    /// One write after a mandatory re-read; extends a held `UpgradeableRead`.
    UpgradeWriteOnce,
    /// Sole access of any kind.
    Exclusive,
}

impl LockingMode {
    pub const ALL: [LockingMode; 4] = [
        LockingMode::ImmutableRead,
        LockingMode::UpgradeableRead,
        LockingMode::UpgradeWriteOnce,
        LockingMode::Exclusive,
    ];

    /// Whether a lock in this mode can ever authorise a write.
    pub fn allows_write(self) -> bool {
        matches!(self, LockingMode::UpgradeWriteOnce | LockingMode::Exclusive)
    }

    /// Whether a request for `self` may coexist with `existing`, held by a
    /// different grant on the same resource. `writing` reports whether that
    /// holder currently has a write stream open on the resource.
    pub fn is_compatible_with(self, existing: LockingMode, writing: bool) -> bool {
        use LockingMode::*;

        match (self, existing) {
            (Exclusive, _) | (_, Exclusive) => false,
            (UpgradeWriteOnce, UpgradeWriteOnce) => false,
            (ImmutableRead, _) => !writing,
            _ => true,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LockingMode::ImmutableRead => "IMMUTABLE_READ",
            LockingMode::UpgradeableRead => "UPGRADEABLE_READ",
            LockingMode::UpgradeWriteOnce => "UPGRADE_WRITE_ONCE",
            LockingMode::Exclusive => "EXCLUSIVE",
        }
    }
}

impl fmt::Display for LockingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::LockingMode::*;
    use super::*;

    #[test]
    fn exclusive_conflicts_with_everything() {
        for mode in LockingMode::ALL {
            assert!(!Exclusive.is_compatible_with(mode, false));
            assert!(!mode.is_compatible_with(Exclusive, false));
        }
    }

    #[test]
    fn readers_share() {
        for requested in [ImmutableRead, UpgradeableRead] {
            for existing in [ImmutableRead, UpgradeableRead, UpgradeWriteOnce] {
                assert!(
                    requested.is_compatible_with(existing, false),
                    "{requested} vs {existing}"
                );
            }
        }
    }

    #[test]
    fn only_one_upgrade_per_resource() {
        assert!(!UpgradeWriteOnce.is_compatible_with(UpgradeWriteOnce, false));
        assert!(UpgradeWriteOnce.is_compatible_with(UpgradeableRead, false));
        assert!(UpgradeWriteOnce.is_compatible_with(ImmutableRead, false));
    }

    #[test]
    fn immutable_read_waits_out_an_open_write() {
        assert!(!ImmutableRead.is_compatible_with(UpgradeWriteOnce, true));
        assert!(!ImmutableRead.is_compatible_with(UpgradeableRead, true));
        assert!(UpgradeableRead.is_compatible_with(UpgradeWriteOnce, true));
    }

    #[test]
    fn modes_order_by_exclusivity() {
        assert!(ImmutableRead < UpgradeableRead);
        assert!(UpgradeWriteOnce < Exclusive);
        assert!(Exclusive.allows_write());
        assert!(!UpgradeableRead.allows_write());
    }

    #[test]
    fn labels_match_serialized_names() {
        for mode in LockingMode::ALL {
            let encoded = toml::Value::try_from(mode).unwrap();
            assert_eq!(encoded.as_str(), Some(mode.label()));
        }
    }
}
