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

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lockwarden::error::Result;
use lockwarden::locking::LockingMode::{Exclusive, ImmutableRead, UpgradeableRead};
use lockwarden::locking::{LockManagement, LockRequest, ResourceUri, SnapshotStorage};
use std::sync::Arc;

struct NamedCopies;

impl SnapshotStorage for NamedCopies {
    fn create_snapshot(&self, resource: &ResourceUri, generation: u64) -> Result<ResourceUri> {
        Ok(ResourceUri::new(format!("{resource}.g{generation}.snapshot")))
    }

    fn delete_snapshot(&self, _snapshot: &ResourceUri) -> Result<()> {
        Ok(())
    }
}

fn manager() -> LockManagement {
    LockManagement::new(Arc::new(NamedCopies))
}

fn bench_grant_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("grant_release");

    for size in [1usize, 10, 100] {
        let resources: Vec<ResourceUri> = (0..size)
            .map(|idx| ResourceUri::new(format!("issue-{idx}.xml")))
            .collect();

        group.bench_with_input(BenchmarkId::new("exclusive", size), &resources, |b, resources| {
            let manager = manager();
            b.iter(|| {
                let request = resources
                    .iter()
                    .fold(LockRequest::new("editor"), |request, resource| {
                        request.with(resource, Exclusive)
                    });
                let result = manager.try_lock(black_box(request), None).unwrap();
                if let Some(access) = result.granted() {
                    access.close().unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_contended_requests(c: &mut Criterion) {
    let manager = manager();
    let year = ResourceUri::new("year.xml");
    let mut readers = Vec::new();
    for idx in 0..64 {
        let result = manager
            .try_lock(LockRequest::single(format!("reader-{idx}"), &year, ImmutableRead), None)
            .unwrap();
        readers.extend(result.into_granted());
    }

    c.bench_function("denied_exclusive_against_64_readers", |b| {
        b.iter(|| {
            let result = manager
                .try_lock(LockRequest::single("writer", &year, Exclusive), None)
                .unwrap();
            black_box(result.conflicts());
        });
    });

    c.bench_function("shared_upgradeable_read", |b| {
        b.iter(|| {
            let result = manager
                .try_lock(LockRequest::single("upgrader", &year, UpgradeableRead), None)
                .unwrap();
            black_box(result.is_granted());
        });
    });

    drop(readers);
}

criterion_group!(benches, bench_grant_release, bench_contended_requests);
criterion_main!(benches);
