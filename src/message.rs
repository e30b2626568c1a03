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

// Sample and message records

use std::time::{SystemTime, UNIX_EPOCH};

use crate::payload::Payload;

/// Current wall-clock time in nanoseconds since the Unix epoch.
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos() as u64)
        .unwrap_or(0)
}

/// A sample as handed over by the subscription layer: payload bytes plus the
/// publish and reception timestamps.
#[derive(Debug, Clone)]
pub struct SampleData {
    pub payload: Payload,
    /// Source timestamp assigned by the publisher, nanoseconds.
    pub publish_time_ns: u64,
    /// Reception timestamp assigned on arrival, nanoseconds.
    pub log_time_ns: u64,
}

impl SampleData {
    pub fn new(payload: Payload, publish_time_ns: u64, log_time_ns: u64) -> Self {
        Self {
            payload,
            publish_time_ns,
            log_time_ns,
        }
    }

    /// Sample stamped with the current reception time.
    pub fn received_now(payload: Payload, publish_time_ns: u64) -> Self {
        Self::new(payload, publish_time_ns, now_nanos())
    }
}

/// A message bound to a channel, ready to be buffered or written.
#[derive(Debug, Clone)]
pub struct Message {
    pub channel_id: u16,
    pub sequence: u32,
    pub publish_time_ns: u64,
    pub log_time_ns: u64,
    pub payload: Payload,
}

impl Message {
    pub fn bind(channel_id: u16, sequence: u32, data: SampleData) -> Self {
        Self {
            channel_id,
            sequence,
            publish_time_ns: data.publish_time_ns,
            log_time_ns: data.log_time_ns,
            payload: data.payload,
        }
    }
}
