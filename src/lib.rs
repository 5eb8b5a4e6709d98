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

//! Multi-user resource locking with snapshot-backed immutable reads.
//!
//! Start with [`locking::LockManagement`]: request locks with
//! [`locking::LockRequest`], resolve where to read or write with
//! `check_permission`, and hand every opened stream to `report_grant` so the
//! manager can track when it closes.

pub mod config;
pub mod error;
pub mod locking;
pub mod logging;
#[cfg(test)]
pub mod test;
