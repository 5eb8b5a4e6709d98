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

pub mod access;
pub mod hygiene;
pub mod lock;
pub mod management;
pub mod mode;
pub mod request;
pub mod resource;
pub mod result;
pub mod snapshot;
pub mod stream;
mod table;


pub use access::GrantedAccess;
pub use hygiene::{SnapshotHygieneReport, SnapshotHygieneRunner, run_startup_hygiene};
pub use lock::{GrantedLock, ImmutableReadLock, Lock};
pub use management::LockManagement;
pub use mode::LockingMode;
pub use request::LockRequest;
pub use resource::ResourceUri;
pub use result::{ConflictMap, DeniedAccess, LockingResult};
pub use snapshot::{FileSnapshotStorage, SnapshotStorage};
pub use stream::{StreamDirection, StreamGuard};
pub use table::LockInfo;
