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

// DDS recorder core writing size-bounded MCAP files
//
// This is the recording engine behind a DDS topic recorder:
// - Ingests typed, topic-addressed samples from a pub/sub data bus
// - Buffers them under a runtime-controllable policy (RUNNING / PAUSED / STOPPED)
// - Holds samples that arrive before their type schema and promotes them on discovery
// - Keeps a sliding event window while paused, dumped on demand
// - Persists everything into self-contained MCAP files with per-file and
//   aggregate size limits, atomic rename-on-close and disk-full degradation

pub mod config;
pub mod dynamic_types;
pub mod error;
pub mod file_tracker;
pub mod handler;
pub mod mcap_writer;
pub mod message;
pub mod monitor;
pub mod payload;
pub mod pending;
pub mod size_tracker;
pub mod topic;

// Re-export main types
pub use config::{load_config, load_config_with_env, CompressionType, RecorderConfig};
pub use dynamic_types::{DynamicTypeEntry, DynamicTypesCollection, DYNAMIC_TYPES_ATTACHMENT_NAME};
pub use error::RecorderError;
pub use file_tracker::FileTracker;
pub use handler::{McapHandler, RecorderState, TypeRegistration, BLANK_SCHEMA_NAME};
pub use mcap_writer::{ChannelSpec, DiskFullCallback, McapWriter, SchemaSpec, MIN_MCAP_SIZE};
pub use message::{now_nanos, Message, SampleData};
pub use monitor::{CountingMonitor, MonitorErrorKind, NoopMonitor, RecorderMonitor};
pub use payload::{HeapPayloadPool, Payload, PayloadPool};
pub use size_tracker::SizeTracker;
pub use topic::{Durability, Reliability, TopicDescriptor, TopicKey, TopicQos};
