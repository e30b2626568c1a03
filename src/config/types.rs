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

// Configuration types for the DDS recorder

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RecorderConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub handler: HandlerConfig,
}

/// Output file naming
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_directory")]
    pub directory: String,

    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            prefix: default_prefix(),
        }
    }
}

/// Size limits and container settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Bytes per file; 0 or a value >= max_size disables rotation.
    #[serde(default)]
    pub max_file_size: u64,

    /// Aggregate byte cap across all files. Must be > 0.
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Per-file headroom for trailing container records; also kept free on
    /// the volume when probing disk space.
    #[serde(default = "default_safety_margin")]
    pub safety_margin: u64,

    /// Chunk compression inside the container.
    #[serde(default)]
    pub compression: CompressionType,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_file_size: 0,
            max_size: default_max_size(),
            safety_margin: default_safety_margin(),
            compression: CompressionType::default(),
        }
    }
}

impl StorageConfig {
    /// Per-file limit with the rotation-disabling values normalized away:
    /// 0 and anything above `max_size` both mean "one budget, no rotation".
    pub fn effective_max_file_size(&self) -> u64 {
        if self.max_file_size == 0 || self.max_file_size > self.max_size {
            self.max_size
        } else {
            self.max_file_size
        }
    }
}

/// Compression type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    None,
    Lz4,
    #[default]
    Zstd,
}

impl CompressionType {
    pub fn to_mcap(self) -> Option<mcap::Compression> {
        match self {
            CompressionType::None => None,
            CompressionType::Lz4 => Some(mcap::Compression::Lz4),
            CompressionType::Zstd => Some(mcap::Compression::Zstd),
        }
    }
}

/// Handler buffering and state-machine settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandlerConfig {
    /// Messages buffered before a dump to file in RUNNING.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Seconds of traffic retained while PAUSED.
    #[serde(default = "default_event_window")]
    pub event_window_seconds: f64,

    /// Seconds between buffer trims while PAUSED.
    #[serde(default = "default_cleanup_period")]
    pub cleanup_period_seconds: f64,

    /// Samples kept per type while waiting for its schema; 0 disables the
    /// RUNNING-state pending queue entirely.
    #[serde(default = "default_max_pending_samples")]
    pub max_pending_samples: usize,

    /// Never write a message whose schema is unknown.
    #[serde(default)]
    pub only_with_schema: bool,

    /// Record discovered types into the dynamic-types attachment.
    #[serde(default = "default_true")]
    pub record_types: bool,

    /// Keep 1 in N samples per topic.
    #[serde(default = "default_downsampling")]
    pub downsampling: u32,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            event_window_seconds: default_event_window(),
            cleanup_period_seconds: default_cleanup_period(),
            max_pending_samples: default_max_pending_samples(),
            only_with_schema: false,
            record_types: default_true(),
            downsampling: default_downsampling(),
        }
    }
}

impl HandlerConfig {
    pub fn event_window(&self) -> Duration {
        Duration::from_secs_f64(self.event_window_seconds)
    }

    pub fn cleanup_period(&self) -> Duration {
        Duration::from_secs_f64(self.cleanup_period_seconds)
    }
}

// Default value functions
fn default_directory() -> String { "./recordings".to_string() }
fn default_prefix() -> String { "recording".to_string() }
fn default_max_size() -> u64 { 10 * 1024 * 1024 * 1024 }
fn default_safety_margin() -> u64 { 65536 }
fn default_buffer_size() -> usize { 100 }
fn default_event_window() -> f64 { 20.0 }
fn default_cleanup_period() -> f64 { 3.0 }
fn default_max_pending_samples() -> usize { 5000 }
fn default_downsampling() -> u32 { 1 }
fn default_true() -> bool { true }
