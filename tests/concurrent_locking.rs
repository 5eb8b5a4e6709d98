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

mod common;

use common::TestWorkspace;
use lockwarden::locking::LockRequest;
use lockwarden::locking::LockingMode::{Exclusive, ImmutableRead};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;

#[test]
fn exactly_one_contender_wins_an_exclusive_lock() {
    let workspace = TestWorkspace::new();
    let manager = workspace.manager();
    let issue = workspace.resource("issue.xml", "<issue/>");
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|idx| {
            let manager = manager.clone();
            let issue = issue.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager
                    .try_lock(LockRequest::single(format!("user-{idx}"), issue, Exclusive), None)
                    .unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.granted()).collect();
    assert_eq!(winners.len(), 1);
    let winner = winners[0].owner().to_string();
    for result in results.iter().filter(|r| !r.is_granted()) {
        let holders = result.conflicts();
        assert_eq!(holders[&issue].iter().collect::<Vec<_>>(), [&winner]);
    }
}

#[test]
fn concurrent_immutable_readers_share_one_copy() {
    let workspace = TestWorkspace::new();
    let manager = workspace.manager();
    let year = workspace.resource("year.xml", "<year/>");
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|idx| {
            let manager = manager.clone();
            let year = year.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let access = manager
                    .try_lock(LockRequest::single(format!("reader-{idx}"), &year, ImmutableRead), None)
                    .unwrap()
                    .into_granted()
                    .unwrap();
                let snapshot = access.check_permission(&year, false).unwrap();
                (access, snapshot)
            })
        })
        .collect();
    let grants: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(workspace.snapshot_files(), 1);
    assert!(grants.windows(2).all(|pair| pair[0].1 == pair[1].1));

    drop(grants);
    assert_eq!(workspace.snapshot_files(), 0);
    assert_eq!(manager.snapshot_count(), 0);
}
