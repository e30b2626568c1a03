// Copyright 2025 coScene
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

/// On-disk file sequence management
///
/// Owns naming, rotation counters, aggregate size accounting and free-space
/// checks for the recording output. Files are written under an in-progress
/// name (`<prefix>_<UTC timestamp>_<index>.mcap.tmp`) and renamed to their
/// final `.mcap` name on clean close, so a crash never leaves a
/// final-looking file behind.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, error, info};

use crate::config::{OutputConfig, StorageConfig};
use crate::error::RecorderError;

/// Suffix of files still being written.
const IN_PROGRESS_SUFFIX: &str = ".tmp";

#[derive(Debug)]
struct FileRecord {
    tmp_path: PathBuf,
    final_path: PathBuf,
    size: u64,
    closed: bool,
}

#[derive(Debug)]
pub struct FileTracker {
    directory: PathBuf,
    prefix: String,
    max_file_size: u64,
    max_size: u64,
    /// Free space kept untouched on the volume.
    disk_reserve: u64,
    files: Vec<FileRecord>,
    next_index: u32,
}

impl FileTracker {
    /// Create a tracker for the configured output directory, creating the
    /// directory if needed.
    pub fn new(output: &OutputConfig, storage: &StorageConfig) -> Result<Self, RecorderError> {
        let directory = PathBuf::from(&output.directory);
        if !directory.exists() {
            info!("Creating output directory: {}", directory.display());
            fs::create_dir_all(&directory).map_err(|error| {
                RecorderError::Initialization(format!(
                    "cannot create output directory {}: {error}",
                    directory.display()
                ))
            })?;
        }

        Ok(Self {
            directory,
            prefix: output.prefix.clone(),
            max_file_size: storage.effective_max_file_size(),
            max_size: storage.max_size,
            disk_reserve: storage.safety_margin,
            files: Vec::new(),
            next_index: 0,
        })
    }

    /// Open the next file in the sequence.
    ///
    /// Fails with [`RecorderError::FullDisk`] when `min_file_size` exceeds
    /// the per-file limit, when the aggregate cap cannot accommodate it, or
    /// when the filesystem does not have `min_file_size` bytes free beyond
    /// the reserve. Free space is probed on every call, never cached.
    pub fn new_file(&mut self, min_file_size: u64) -> Result<(), RecorderError> {
        if min_file_size > self.max_file_size {
            return Err(RecorderError::FullDisk(format!(
                "minimum file size ({min_file_size} B) exceeds the maximum file size ({} B)",
                self.max_file_size
            )));
        }

        let remaining = self.max_size.saturating_sub(self.total_size());
        if remaining < min_file_size {
            return Err(RecorderError::FullDisk(format!(
                "aggregate size cap reached: {remaining} B remaining of {} B, {min_file_size} B required",
                self.max_size
            )));
        }

        let free = fs2::available_space(&self.directory)?;
        if free.saturating_sub(self.disk_reserve) < min_file_size {
            return Err(RecorderError::FullDisk(format!(
                "not enough free space on {}: {free} B free, {min_file_size} B required plus {} B reserve",
                self.directory.display(),
                self.disk_reserve
            )));
        }

        let timestamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
        let final_name = format!("{}_{}_{:04}.mcap", self.prefix, timestamp, self.next_index);
        let final_path = self.directory.join(&final_name);
        let tmp_path = self
            .directory
            .join(format!("{final_name}{IN_PROGRESS_SUFFIX}"));

        debug!("Opening recording file {}", tmp_path.display());

        self.files.push(FileRecord {
            tmp_path,
            final_path,
            size: 0,
            closed: false,
        });
        self.next_index += 1;

        Ok(())
    }

    /// Path of the file currently being written, if any.
    pub fn current_path(&self) -> Option<&Path> {
        self.files
            .iter()
            .rev()
            .find(|record| !record.closed)
            .map(|record| record.tmp_path.as_path())
    }

    /// Update the in-memory size estimate of the open file.
    pub fn set_current_file_size(&mut self, size: u64) {
        if let Some(record) = self.files.iter_mut().rev().find(|record| !record.closed) {
            record.size = size;
        }
    }

    /// Rename the in-progress file to its final name and mark it closed.
    pub fn close_file(&mut self) {
        let Some(record) = self.files.iter_mut().rev().find(|record| !record.closed) else {
            return;
        };

        match fs::rename(&record.tmp_path, &record.final_path) {
            Ok(()) => {
                info!(
                    "Closed recording file {} ({} B)",
                    record.final_path.display(),
                    record.size
                );
            }
            Err(rename_error) => {
                error!(
                    "Failed to rename {} to {}: {}",
                    record.tmp_path.display(),
                    record.final_path.display(),
                    rename_error
                );
            }
        }

        record.closed = true;
    }

    /// Drop the open entry without renaming, for files that never came into
    /// existence because creation failed. The open entry is always the most
    /// recently pushed one.
    pub fn abandon_file(&mut self) {
        if self.files.last().is_some_and(|record| !record.closed) {
            let record = self.files.pop();
            if let Some(record) = record {
                debug!("Abandoning recording file {}", record.tmp_path.display());
            }
            self.next_index = self.next_index.saturating_sub(1);
        }
    }

    /// Sum of sizes of every file, closed and open.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|record| record.size).sum()
    }

    /// Per-file byte budget for the next file: the file limit clamped by
    /// what the aggregate cap still allows.
    pub fn file_budget(&self) -> u64 {
        self.max_file_size
            .min(self.max_size.saturating_sub(self.total_size()))
    }

    /// Whether the configuration admits a single file only. When true, a
    /// full file means a full disk.
    pub fn rotation_disabled(&self) -> bool {
        self.max_file_size == self.max_size
    }

    /// Final paths of all cleanly closed files, in creation order.
    pub fn closed_files(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|record| record.closed)
            .map(|record| record.final_path.clone())
            .collect()
    }
}
