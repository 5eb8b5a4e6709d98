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
use log::trace;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Whether a guarded stream reads from or writes to its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDirection {
    Read,
    Write,
}

/// Wraps a caller's stream and reports its closure back to the lock table.
///
/// The raw stream is closed first, then the open-stream count of the grant is
/// decremented exactly once. A completed write stream bumps the resource's
/// content generation; a read stream over a snapshot releases its reference
/// to the copy. Dropping the guard has the same effect as `close`.
pub struct StreamGuard<S> {
    stream: Option<S>,
    access: GrantedAccess,
    resource: ResourceUri,
    direction: StreamDirection,
    pinned_generation: Option<u64>,
    released: bool,
}

impl<S> StreamGuard<S> {
    pub(crate) fn new(
        stream: S,
        access: GrantedAccess,
        resource: ResourceUri,
        direction: StreamDirection,
        pinned_generation: Option<u64>,
    ) -> Self {
        Self {
            stream: Some(stream),
            access,
            resource,
            direction,
            pinned_generation,
            released: false,
        }
    }

    pub fn resource(&self) -> &ResourceUri {
        &self.resource
    }

    pub fn direction(&self) -> StreamDirection {
        self.direction
    }

    pub fn get_ref(&self) -> Option<&S> {
        self.stream.as_ref()
    }

    pub fn close(mut self) {
        self.release_inner();
    }

    fn inner_mut(&mut self) -> io::Result<&mut S> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::other("stream guard has already been closed"))
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        drop(self.stream.take());
        self.access
            .close_stream(&self.resource, self.direction, self.pinned_generation);
        trace!(
            "Closed {:?} stream on {} for {}",
            self.direction,
            self.resource,
            self.access.owner()
        );
    }
}

impl<S> Drop for StreamGuard<S> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl<S> fmt::Debug for StreamGuard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamGuard")
            .field("resource", &self.resource)
            .field("direction", &self.direction)
            .field("owner", &self.access.owner())
            .field("released", &self.released)
            .finish()
    }
}

impl<S: Read> Read for StreamGuard<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner_mut()?.read(buf)
    }
}

impl<S: Write> Write for StreamGuard<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner_mut()?.flush()
    }
}

impl<S: Seek> Seek for StreamGuard<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner_mut()?.seek(pos)
    }
}
