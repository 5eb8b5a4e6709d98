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
use std::collections::BTreeMap;

/// A user's desired modes for one or more resources, evaluated atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    owner: String,
    resources: BTreeMap<ResourceUri, LockingMode>,
}

impl LockRequest {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            resources: BTreeMap::new(),
        }
    }

    pub fn single(
        owner: impl Into<String>,
        resource: impl Into<ResourceUri>,
        mode: LockingMode,
    ) -> Self {
        Self::new(owner).with(resource, mode)
    }

    /// Adds a resource; a later mode for the same resource replaces an earlier one.
    pub fn with(mut self, resource: impl Into<ResourceUri>, mode: LockingMode) -> Self {
        self.resources.insert(resource.into(), mode);
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn resources(&self) -> &BTreeMap<ResourceUri, LockingMode> {
        &self.resources
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn into_parts(self) -> (String, BTreeMap<ResourceUri, LockingMode>) {
        (self.owner, self.resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_resources() {
        let request = LockRequest::new("alice")
            .with("issue.xml", LockingMode::Exclusive)
            .with("year.xml", LockingMode::ImmutableRead);

        assert_eq!(request.owner(), "alice");
        assert_eq!(request.resources().len(), 2);
        assert_eq!(
            request.resources().get(&ResourceUri::new("year.xml")),
            Some(&LockingMode::ImmutableRead)
        );
    }

    #[test]
    fn repeated_resource_keeps_last_mode() {
        let request = LockRequest::single("bob", "a.xml", LockingMode::ImmutableRead)
            .with("a.xml", LockingMode::UpgradeableRead);

        let (owner, resources) = request.into_parts();
        assert_eq!(owner, "bob");
        assert_eq!(resources.len(), 1);
        assert_eq!(resources.values().next(), Some(&LockingMode::UpgradeableRead));
    }
}
