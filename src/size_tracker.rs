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

/// Byte accounting for the current output file
///
/// Every write is a two-step operation: `*_to_write` reserves an estimate of
/// the serialized record size and fails with [`RecorderError::FullFile`] when
/// the reservation would exceed the per-file budget; `*_written` commits the
/// reservation once the container confirmed the write. Keeping the staged
/// total (`potential_size`) separate from the committed total
/// (`written_size`) lets the file tracker publish a conservative current-size
/// estimate between reserve and commit.
///
/// Estimates follow the MCAP record layout with string and map fields length
/// prefixed. Schema and channel records count twice: the container repeats
/// them in the summary section. Container framing the estimates do not cover
/// (chunk records, footer, statistics) is absorbed by the safety margin.
use std::collections::BTreeMap;

use crate::error::RecorderError;
use crate::mcap_writer::{ChannelSpec, SchemaSpec};

/// Opcode byte plus the u64 record length.
const RECORD_OVERHEAD: u64 = 9;

/// channel_id + sequence + log_time + publish_time of a message record.
const MESSAGE_FIXED: u64 = 22;

/// Per-message entry in the chunk's message index.
const MESSAGE_INDEX_ENTRY: u64 = 16;

/// Magic bytes, header record, footer record and trailing magic of an
/// otherwise empty file, rounded up.
pub const MCAP_FILE_OVERHEAD: u64 = 1024;

fn string_size(value: &str) -> u64 {
    4 + value.len() as u64
}

fn map_size(map: &BTreeMap<String, String>) -> u64 {
    4 + map
        .iter()
        .map(|(key, value)| string_size(key) + string_size(value))
        .sum::<u64>()
}

/// Serialized size of a schema record, data section plus summary repeat.
pub fn schema_size(spec: &SchemaSpec) -> u64 {
    let record = RECORD_OVERHEAD
        + 2
        + string_size(&spec.name)
        + string_size(&spec.encoding)
        + 4
        + spec.data.len() as u64;
    2 * record
}

/// Serialized size of a channel record, data section plus summary repeat.
pub fn channel_size(spec: &ChannelSpec) -> u64 {
    let record = RECORD_OVERHEAD
        + 4
        + string_size(&spec.topic)
        + string_size(&spec.message_encoding)
        + map_size(&spec.metadata);
    2 * record
}

/// Serialized size of a message record plus its message-index entry.
pub fn message_size(data_len: u64) -> u64 {
    RECORD_OVERHEAD + MESSAGE_FIXED + MESSAGE_INDEX_ENTRY + data_len
}

/// Serialized size of a metadata record plus its index entry.
pub fn metadata_size(name: &str, map: &BTreeMap<String, String>) -> u64 {
    let record = RECORD_OVERHEAD + string_size(name) + map_size(map);
    let index = RECORD_OVERHEAD + 16 + string_size(name);
    record + index
}

/// Serialized size of an attachment record plus its index entry.
pub fn attachment_size(name: &str, media_type: &str, data_len: u64) -> u64 {
    let record = RECORD_OVERHEAD
        + 16
        + string_size(name)
        + string_size(media_type)
        + 8
        + data_len
        + 4;
    let index = RECORD_OVERHEAD + 40 + string_size(name) + string_size(media_type);
    record + index
}

#[derive(Debug, Default)]
pub struct SizeTracker {
    file_limit: u64,
    safety_margin: u64,
    /// Bytes reserved so far, committed or not.
    potential: u64,
    /// Bytes confirmed by the container.
    written: u64,
    /// Bytes every successor file must accommodate up front: file overhead
    /// plus the records replayed into each new file.
    min_size: u64,
    /// Current attachment reservation, part of the minimum but re-reserved
    /// whenever the dynamic-types payload changes.
    attachment_reserved: u64,
}

impl SizeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accounting for a fresh file with the given budget and headroom.
    pub fn init(&mut self, file_limit: u64, safety_margin: u64) {
        self.file_limit = file_limit;
        self.safety_margin = safety_margin;
        self.potential = 0;
        self.written = 0;
        self.min_size = MCAP_FILE_OVERHEAD;
        self.attachment_reserved = 0;
    }

    fn reserve(&mut self, size: u64) -> Result<(), RecorderError> {
        let budget = self.file_limit.saturating_sub(self.safety_margin);
        if self.potential.saturating_add(size) > budget {
            return Err(RecorderError::FullFile { data_size: size });
        }
        self.potential += size;
        Ok(())
    }

    pub fn schema_to_write(&mut self, spec: &SchemaSpec) -> Result<(), RecorderError> {
        self.reserve(schema_size(spec))
    }

    pub fn schema_written(&mut self, spec: &SchemaSpec) {
        let size = schema_size(spec);
        self.written += size;
        self.min_size += size;
    }

    pub fn channel_to_write(&mut self, spec: &ChannelSpec) -> Result<(), RecorderError> {
        self.reserve(channel_size(spec))
    }

    pub fn channel_written(&mut self, spec: &ChannelSpec) {
        let size = channel_size(spec);
        self.written += size;
        self.min_size += size;
    }

    pub fn message_to_write(&mut self, data_len: u64) -> Result<(), RecorderError> {
        self.reserve(message_size(data_len))
    }

    pub fn message_written(&mut self, data_len: u64) {
        self.written += message_size(data_len);
    }

    pub fn metadata_to_write(
        &mut self,
        name: &str,
        map: &BTreeMap<String, String>,
    ) -> Result<(), RecorderError> {
        self.reserve(metadata_size(name, map))
    }

    pub fn metadata_written(&mut self, name: &str, map: &BTreeMap<String, String>) {
        let size = metadata_size(name, map);
        self.written += size;
        self.min_size += size;
    }

    /// Reserve space for an attachment of `new_len` bytes, releasing a
    /// previous reservation of `old_len` bytes (0 when none was made).
    pub fn attachment_to_write(&mut self, new_len: u64, old_len: u64) -> Result<(), RecorderError> {
        let (name, media) = (
            crate::dynamic_types::DYNAMIC_TYPES_ATTACHMENT_NAME,
            crate::dynamic_types::DYNAMIC_TYPES_MEDIA_TYPE,
        );

        let old_estimate = if self.attachment_reserved > 0 {
            attachment_size(name, media, old_len)
        } else {
            0
        };
        let new_estimate = attachment_size(name, media, new_len);

        self.potential = self.potential.saturating_sub(old_estimate);
        match self.reserve(new_estimate) {
            Ok(()) => {
                self.attachment_reserved = new_estimate;
                Ok(())
            }
            Err(error) => {
                // Restore the released reservation; the caller will rotate
                // and retry.
                self.potential += old_estimate;
                Err(error)
            }
        }
    }

    pub fn attachment_written(&mut self, data_len: u64) {
        self.written += attachment_size(
            crate::dynamic_types::DYNAMIC_TYPES_ATTACHMENT_NAME,
            crate::dynamic_types::DYNAMIC_TYPES_MEDIA_TYPE,
            data_len,
        );
    }

    /// Bytes a fresh file must fit before accepting any message: overhead,
    /// version metadata, known schemas and channels, and the pending
    /// attachment.
    pub fn min_mcap_size(&self) -> u64 {
        self.min_size + self.attachment_reserved
    }

    pub fn potential_size(&self) -> u64 {
        self.potential
    }

    pub fn written_size(&self) -> u64 {
        self.written
    }
}
