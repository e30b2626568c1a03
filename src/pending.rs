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

/// Storage for samples received before their schema
///
/// Samples are indexed by type name, not by topic: when the schema for type
/// T arrives, every queued sample of T is promoted at once, whatever topic
/// it came in on. Two parallel maps exist because RUNNING-era and PAUSED-era
/// samples have different fates on promotion (see the handler).
use std::collections::{HashMap, VecDeque};

use crate::message::SampleData;
use crate::topic::TopicDescriptor;

/// A sample waiting for its schema, with the sequence number it was assigned
/// on arrival.
#[derive(Debug, Clone)]
pub struct PendingSample {
    pub sequence: u32,
    pub data: SampleData,
}

type PendingList = VecDeque<(TopicDescriptor, PendingSample)>;

#[derive(Debug, Default)]
pub struct PendingStore {
    /// Per-type cap; 0 means the RUNNING map is not used at all.
    max_per_type: usize,
    running: HashMap<String, PendingList>,
    paused: HashMap<String, PendingList>,
}

impl PendingStore {
    pub fn new(max_per_type: usize) -> Self {
        Self {
            max_per_type,
            running: HashMap::new(),
            paused: HashMap::new(),
        }
    }

    /// Queue a RUNNING-era sample. When the per-type list is full the oldest
    /// entry is popped and returned; the caller decides whether it is written
    /// under the blank schema or dropped.
    pub fn push_running(
        &mut self,
        topic: &TopicDescriptor,
        sample: PendingSample,
    ) -> Option<(TopicDescriptor, PendingSample)> {
        let list = self.running.entry(topic.type_name.clone()).or_default();

        let overflow = if self.max_per_type > 0 && list.len() >= self.max_per_type {
            list.pop_front()
        } else {
            None
        };

        list.push_back((topic.clone(), sample));
        overflow
    }

    /// Queue a PAUSED-era sample. Overflow drops the oldest silently: a
    /// paused sample that falls out of the queue would have been trimmed by
    /// the event window anyway.
    pub fn push_paused(&mut self, topic: &TopicDescriptor, sample: PendingSample) {
        let list = self.paused.entry(topic.type_name.clone()).or_default();

        if self.max_per_type > 0 && list.len() >= self.max_per_type {
            list.pop_front();
        }

        list.push_back((topic.clone(), sample));
    }

    /// Remove and return every RUNNING-era sample of the given type.
    pub fn take_running(&mut self, type_name: &str) -> PendingList {
        self.running.remove(type_name).unwrap_or_default()
    }

    /// Remove and return every PAUSED-era sample of the given type.
    pub fn take_paused(&mut self, type_name: &str) -> PendingList {
        self.paused.remove(type_name).unwrap_or_default()
    }

    /// Drain the whole RUNNING map, in no particular type order. Samples
    /// within a type keep their arrival order.
    pub fn drain_running(&mut self) -> Vec<(TopicDescriptor, PendingSample)> {
        let mut drained: Vec<_> = self
            .running
            .drain()
            .flat_map(|(_, list)| list.into_iter())
            .collect();
        drained.sort_by_key(|(_, sample)| sample.sequence);
        drained
    }

    pub fn clear_paused(&mut self) {
        self.paused.clear();
    }

    pub fn running_len(&self) -> usize {
        self.running.values().map(VecDeque::len).sum()
    }

    pub fn paused_len(&self) -> usize {
        self.paused.values().map(VecDeque::len).sum()
    }
}
