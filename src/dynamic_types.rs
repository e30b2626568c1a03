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

/// Dynamic-types collection written as a single attachment at file close
///
/// Each discovered type contributes one (name, type identifier, type object)
/// triple. The serialized form is a sequence of length-prefixed records:
///
/// ```text
/// u32 entry_count
/// per entry: u32 len + name bytes
///            u32 len + type identifier bytes
///            u32 len + type object bytes
/// ```
///
/// All prefixes are little-endian. The replay engine reads this attachment to
/// re-register every type before decoding messages.
use std::collections::HashSet;

use crate::error::RecorderError;

/// Name of the attachment carrying the serialized collection.
pub const DYNAMIC_TYPES_ATTACHMENT_NAME: &str = "dynamic_types";

/// Media type of the attachment.
pub const DYNAMIC_TYPES_MEDIA_TYPE: &str = "application/octet-stream";

/// One discovered type: its name plus the opaque serialized identifier and
/// object produced by the type-discovery layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicTypeEntry {
    pub type_name: String,
    pub type_identifier: Vec<u8>,
    pub type_object: Vec<u8>,
}

/// Ordered collection of discovered types, one entry per type name.
#[derive(Debug, Default)]
pub struct DynamicTypesCollection {
    entries: Vec<DynamicTypeEntry>,
    names: HashSet<String>,
}

impl DynamicTypesCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a type. Returns false if the name was already recorded.
    pub fn insert(&mut self, entry: DynamicTypeEntry) -> bool {
        if !self.names.insert(entry.type_name.clone()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DynamicTypeEntry] {
        &self.entries
    }

    /// Serialize the collection into the attachment payload.
    pub fn serialize(&self) -> Vec<u8> {
        let total: usize = self
            .entries
            .iter()
            .map(|entry| {
                12 + entry.type_name.len() + entry.type_identifier.len() + entry.type_object.len()
            })
            .sum();

        let mut buffer = Vec::with_capacity(4 + total);
        buffer.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());

        for entry in &self.entries {
            write_field(&mut buffer, entry.type_name.as_bytes());
            write_field(&mut buffer, &entry.type_identifier);
            write_field(&mut buffer, &entry.type_object);
        }

        buffer
    }

    /// Parse a payload produced by [`serialize`](Self::serialize).
    pub fn deserialize(bytes: &[u8]) -> Result<Self, RecorderError> {
        let mut cursor = 0usize;
        let count = read_u32(bytes, &mut cursor)? as usize;

        let mut collection = Self::new();
        for _ in 0..count {
            let name = read_field(bytes, &mut cursor)?;
            let type_identifier = read_field(bytes, &mut cursor)?.to_vec();
            let type_object = read_field(bytes, &mut cursor)?.to_vec();

            let type_name = String::from_utf8(name.to_vec()).map_err(|_| {
                RecorderError::Inconsistency("dynamic type name is not valid UTF-8".to_string())
            })?;

            collection.insert(DynamicTypeEntry {
                type_name,
                type_identifier,
                type_object,
            });
        }

        Ok(collection)
    }
}

fn write_field(buffer: &mut Vec<u8>, bytes: &[u8]) {
    buffer.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buffer.extend_from_slice(bytes);
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32, RecorderError> {
    let end = cursor
        .checked_add(4)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| {
            RecorderError::Inconsistency("truncated dynamic types payload".to_string())
        })?;

    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[*cursor..end]);
    *cursor = end;
    Ok(u32::from_le_bytes(raw))
}

fn read_field<'a>(bytes: &'a [u8], cursor: &mut usize) -> Result<&'a [u8], RecorderError> {
    let len = read_u32(bytes, cursor)? as usize;
    let end = cursor
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| {
            RecorderError::Inconsistency("truncated dynamic types payload".to_string())
        })?;

    let field = &bytes[*cursor..end];
    *cursor = end;
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> DynamicTypeEntry {
        DynamicTypeEntry {
            type_name: name.to_string(),
            type_identifier: vec![1, 2, 3],
            type_object: vec![4, 5, 6, 7],
        }
    }

    #[test]
    fn test_insert_deduplicates_by_name() {
        let mut collection = DynamicTypesCollection::new();
        assert!(collection.insert(entry("std_msgs::msg::String")));
        assert!(!collection.insert(entry("std_msgs::msg::String")));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut collection = DynamicTypesCollection::new();
        collection.insert(entry("std_msgs::msg::String"));
        collection.insert(entry("sensor_msgs::msg::Imu"));

        let payload = collection.serialize();
        let parsed = DynamicTypesCollection::deserialize(&payload).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.entries()[0], collection.entries()[0]);
        assert_eq!(parsed.entries()[1], collection.entries()[1]);
    }

    #[test]
    fn test_deserialize_rejects_truncated_payload() {
        let mut collection = DynamicTypesCollection::new();
        collection.insert(entry("std_msgs::msg::String"));

        let mut payload = collection.serialize();
        payload.truncate(payload.len() - 2);

        assert!(DynamicTypesCollection::deserialize(&payload).is_err());
    }

    #[test]
    fn test_empty_collection() {
        let collection = DynamicTypesCollection::new();
        let payload = collection.serialize();
        assert_eq!(payload, vec![0, 0, 0, 0]);

        let parsed = DynamicTypesCollection::deserialize(&payload).unwrap();
        assert!(parsed.is_empty());
    }
}
