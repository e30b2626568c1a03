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

// Error types for the recorder core

use thiserror::Error;

/// Errors raised by the recording core.
///
/// `FullFile` is always handled internally (it triggers file rotation) and
/// should never reach an embedder. `FullDisk` surfaces through the disk-full
/// callback. `Initialization` is the only error propagated from `start` /
/// construction.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// A reservation of `data_size` bytes would exceed the per-file budget.
    #[error("record of {data_size} bytes does not fit in the current file")]
    FullFile { data_size: u64 },

    /// A new file cannot be obtained: the disk, or the aggregate size cap,
    /// is exhausted.
    #[error("disk capacity exhausted: {0}")]
    FullDisk(String),

    /// A channel was requested for a topic whose schema is unknown while
    /// `only_with_schema` forbids blank channels, or an internal map went
    /// out of sync.
    #[error("inconsistent recorder state: {0}")]
    Inconsistency(String),

    /// The output file could not be created or opened for writing.
    #[error("failed to initialize output file: {0}")]
    Initialization(String),

    /// The underlying MCAP writer reported an error. The affected write is
    /// dropped; recording continues.
    #[error("container write failed: {0}")]
    Writer(#[from] mcap::McapError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
