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

// Topic descriptors and QoS metadata

use serde::{Deserialize, Serialize};

/// Reliability kind of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    #[default]
    BestEffort,
    Reliable,
}

/// Durability kind of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    #[default]
    Volatile,
    TransientLocal,
}

/// QoS settings relevant to recording.
///
/// Serialized into each channel's metadata so a reader can reconstruct the
/// subscription settings of the recorded topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TopicQos {
    #[serde(default)]
    pub reliability: Reliability,
    #[serde(default)]
    pub durability: Durability,
    #[serde(default)]
    pub history_depth: u32,
    #[serde(default)]
    pub keyed: bool,
}

impl TopicQos {
    /// Compact string form, stored in channel metadata and used as part of
    /// the topic key.
    pub fn signature(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Full description of a topic as announced by the subscription layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescriptor {
    pub name: String,
    pub type_name: String,
    pub qos: TopicQos,
}

impl TopicDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, qos: TopicQos) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            qos,
        }
    }

    pub fn key(&self) -> TopicKey {
        TopicKey {
            name: self.name.clone(),
            type_name: self.type_name.clone(),
            qos_signature: self.qos.signature(),
        }
    }
}

/// Identity of a topic within a recording.
///
/// Two topics with the same name but different type or QoS compare distinct
/// and record into distinct channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicKey {
    pub name: String,
    pub type_name: String,
    pub qos_signature: String,
}
