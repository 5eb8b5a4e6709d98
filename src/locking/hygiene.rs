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

//! Hygiene routines for orphaned snapshot copies.
//!
//! Lock state lives only in memory, so copies referenced by a process that
//! crashed are never released. The sweep removes snapshot files older than a
//! threshold and must run before a manager starts using the directory.

use crate::config::LockingConfig;
use crate::error::Result;
use crate::locking::snapshot::{is_snapshot_file, remove_snapshot_file};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use walkdir::WalkDir;

/// Summary of a hygiene sweep.
#[derive(Debug, Default, Clone)]
pub struct SnapshotHygieneReport {
    pub removed_snapshots: usize,
    pub retained_snapshots: usize,
    pub errors: usize,
    pub duration: Duration,
}

/// Executes cleanup of orphaned snapshot copies.
#[derive(Debug, Clone)]
pub struct SnapshotHygieneRunner {
    root: PathBuf,
    age_threshold: Duration,
}

impl SnapshotHygieneRunner {
    pub fn new(root: PathBuf, age_threshold: Duration) -> Self {
        Self {
            root,
            age_threshold,
        }
    }

    pub fn run(&self) -> Result<SnapshotHygieneReport> {
        self.run_with_now(SystemTime::now())
    }

    pub(crate) fn run_with_now(&self, now: SystemTime) -> Result<SnapshotHygieneReport> {
        let start = Instant::now();
        let mut report = SnapshotHygieneReport::default();

        if !self.root.exists() {
            report.duration = start.elapsed();
            return Ok(report);
        }

        for entry in WalkDir::new(&self.root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        "Failed to walk snapshot directory {}: {err}",
                        self.root.display()
                    );
                    report.errors += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_snapshot_file(entry.path()) {
                continue;
            }
            self.process_snapshot(entry.path(), now, &mut report);
        }

        report.duration = start.elapsed();
        debug!(
            "Snapshot hygiene sweep removed {} snapshot(s), kept {} in {:.3}s (errors: {})",
            report.removed_snapshots,
            report.retained_snapshots,
            report.duration.as_secs_f64(),
            report.errors
        );
        Ok(report)
    }

    fn process_snapshot(&self, path: &Path, now: SystemTime, report: &mut SnapshotHygieneReport) {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(
                    "Failed to read metadata for snapshot {}: {err}",
                    path.display()
                );
                report.errors += 1;
                return;
            }
        };

        if !is_stale(&metadata, now, self.age_threshold) {
            report.retained_snapshots += 1;
            return;
        }

        match remove_snapshot_file(path) {
            Ok(true) => report.removed_snapshots += 1,
            Ok(false) => {}
            Err(err) => {
                warn!("Failed to remove snapshot {}: {err}", path.display());
                report.errors += 1;
            }
        }
    }
}

/// Sweeps the configured snapshot directory using the configured threshold.
pub fn run_startup_hygiene(config: &LockingConfig) -> Result<SnapshotHygieneReport> {
    let runner = SnapshotHygieneRunner::new(config.snapshot_dir.clone(), config.hygiene_age());
    runner.run()
}

fn is_stale(metadata: &fs::Metadata, now: SystemTime, threshold: Duration) -> bool {
    match metadata.modified() {
        Ok(modified) => now.duration_since(modified).unwrap_or(Duration::ZERO) >= threshold,
        Err(_) => false,
    }
}
