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

/// Pending-sample management tests: schema-after-message, overflow policy,
/// the max_pending_samples == 0 special case, and type evolution
///
use std::path::PathBuf;
use std::sync::Arc;

use dds_recorder::config::RecorderConfig;
use dds_recorder::{
    now_nanos, CountingMonitor, HeapPayloadPool, McapHandler, MonitorErrorKind, NoopMonitor,
    PayloadPool, RecorderState, SampleData, TopicDescriptor, TopicQos, TypeRegistration,
};
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> RecorderConfig {
    let mut config = RecorderConfig::default();
    config.output.directory = dir.path().to_string_lossy().to_string();
    config.output.prefix = "pending".to_string();
    config.storage.max_size = 64 * 1024 * 1024;
    config.storage.safety_margin = 1024;
    config.storage.compression = dds_recorder::CompressionType::None;
    config.handler.buffer_size = 1000;
    config.handler.max_pending_samples = 100;
    config
}

fn topic(name: &str, type_name: &str) -> TopicDescriptor {
    TopicDescriptor::new(name, type_name, TopicQos::default())
}

fn sample(pool: &HeapPayloadPool, bytes: &[u8]) -> SampleData {
    SampleData::received_now(pool.acquire(bytes), now_nanos())
}

fn registration(type_name: &str) -> TypeRegistration {
    TypeRegistration {
        type_name: type_name.to_string(),
        encoding: "ros2msg".to_string(),
        schema_data: format!("# schema for {type_name}").into_bytes(),
        type_identifier: vec![0xAB; 8],
        type_object: vec![0xCD; 16],
    }
}

fn mcap_files(dir: &TempDir) -> Vec<PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "mcap"))
        .collect();
    files.sort();
    files
}

fn read_all_messages(dir: &TempDir) -> Vec<(Option<String>, Vec<u8>, u32)> {
    let mut all = Vec::new();
    for path in mcap_files(dir) {
        let contents = std::fs::read(&path).unwrap();
        for message in mcap::MessageStream::new(&contents).unwrap() {
            let message = message.unwrap();
            all.push((
                message
                    .channel
                    .schema
                    .as_ref()
                    .map(|schema| schema.name.clone()),
                message.data.to_vec(),
                message.sequence,
            ));
        }
    }
    all
}

#[test]
fn test_schema_after_messages_keeps_all_in_order() {
    // Ten samples of an unknown type, then its schema: the file must carry
    // all ten bound to the real schema, in arrival order.
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let pool = Arc::new(HeapPayloadPool::new());
    let handler = McapHandler::new(
        &config,
        pool.clone(),
        RecorderState::Running,
        None,
        Arc::new(NoopMonitor),
    )
    .unwrap();

    for index in 0..10u32 {
        handler.add_data(
            &topic("rt/late", "LateType"),
            sample(&pool, format!("payload-{index}").as_bytes()),
        );
    }
    assert_eq!(handler.pending_samples(), 10);
    assert_eq!(handler.buffered_samples(), 0);

    handler.add_schema(registration("LateType"));
    assert_eq!(handler.pending_samples(), 0);
    assert_eq!(handler.buffered_samples(), 10);

    handler.stop();
    drop(handler);

    let messages = read_all_messages(&dir);
    assert_eq!(messages.len(), 10);
    for (index, (schema_name, data, sequence)) in messages.iter().enumerate() {
        assert_eq!(schema_name.as_deref(), Some("LateType"));
        assert_eq!(data, format!("payload-{index}").as_bytes());
        assert_eq!(*sequence, index as u32);
    }
}

#[test]
fn test_overflow_writes_oldest_under_blank_schema() {
    // max_pending_samples = 3, only_with_schema = false: of five samples of
    // an unknown type, the two oldest are written under the blank schema and
    // the last three stay pending.
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.handler.max_pending_samples = 3;
    let pool = Arc::new(HeapPayloadPool::new());
    let handler = McapHandler::new(
        &config,
        pool.clone(),
        RecorderState::Running,
        None,
        Arc::new(NoopMonitor),
    )
    .unwrap();

    for index in 0..5u32 {
        handler.add_data(
            &topic("rt/unknown", "UnknownType"),
            sample(&pool, format!("payload-{index}").as_bytes()),
        );
    }

    assert_eq!(handler.pending_samples(), 3);
    assert_eq!(handler.buffered_samples(), 2);

    handler.stop();
    drop(handler);

    // Stop flushed the remaining pending samples under the blank schema as
    // well; arrival order is preserved across both paths.
    let messages = read_all_messages(&dir);
    assert_eq!(messages.len(), 5);
    for (index, (schema_name, data, sequence)) in messages.iter().enumerate() {
        assert_eq!(schema_name.as_deref(), Some(""));
        assert_eq!(data, format!("payload-{index}").as_bytes());
        assert_eq!(*sequence, index as u32);
    }
}

#[test]
fn test_overflow_drops_oldest_when_only_with_schema() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.handler.max_pending_samples = 2;
    config.handler.only_with_schema = true;
    let pool = Arc::new(HeapPayloadPool::new());
    let handler = McapHandler::new(
        &config,
        pool.clone(),
        RecorderState::Running,
        None,
        Arc::new(NoopMonitor),
    )
    .unwrap();

    for index in 0..4u32 {
        handler.add_data(
            &topic("rt/unknown", "UnknownType"),
            sample(&pool, format!("payload-{index}").as_bytes()),
        );
    }

    assert_eq!(handler.pending_samples(), 2);
    assert_eq!(handler.buffered_samples(), 0);

    // The retained two are the newest; their schema finally arrives.
    handler.add_schema(registration("UnknownType"));
    handler.stop();
    drop(handler);

    let messages = read_all_messages(&dir);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].1, b"payload-2");
    assert_eq!(messages[1].1, b"payload-3");
}

#[test]
fn test_pending_disabled_writes_directly_under_blank() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.handler.max_pending_samples = 0;
    let pool = Arc::new(HeapPayloadPool::new());
    let handler = McapHandler::new(
        &config,
        pool.clone(),
        RecorderState::Running,
        None,
        Arc::new(NoopMonitor),
    )
    .unwrap();

    for index in 0..3u32 {
        handler.add_data(
            &topic("rt/unknown", "UnknownType"),
            sample(&pool, format!("payload-{index}").as_bytes()),
        );
    }

    assert_eq!(handler.pending_samples(), 0);
    assert_eq!(handler.buffered_samples(), 3);

    handler.stop();
    drop(handler);

    let messages = read_all_messages(&dir);
    assert_eq!(messages.len(), 3);
    for (schema_name, _, _) in &messages {
        assert_eq!(schema_name.as_deref(), Some(""));
    }
}

#[test]
fn test_pending_disabled_with_only_with_schema_discards() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.handler.max_pending_samples = 0;
    config.handler.only_with_schema = true;
    let pool = Arc::new(HeapPayloadPool::new());
    let handler = McapHandler::new(
        &config,
        pool.clone(),
        RecorderState::Running,
        None,
        Arc::new(NoopMonitor),
    )
    .unwrap();

    for _ in 0..3 {
        handler.add_data(&topic("rt/unknown", "UnknownType"), sample(&pool, b"x"));
    }

    assert_eq!(handler.pending_samples(), 0);
    assert_eq!(handler.buffered_samples(), 0);

    handler.stop();
    drop(handler);
    assert!(read_all_messages(&dir).is_empty());
}

#[test]
fn test_type_evolution_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let pool = Arc::new(HeapPayloadPool::new());
    let monitor = Arc::new(CountingMonitor::new());
    let handler = McapHandler::new(
        &config,
        pool.clone(),
        RecorderState::Running,
        None,
        monitor.clone(),
    )
    .unwrap();

    handler.add_schema(registration("EvolvingType"));

    // Same name, different schema content: rejected, channels keep the
    // original binding.
    let mut evolved = registration("EvolvingType");
    evolved.schema_data = b"# a different schema".to_vec();
    handler.add_schema(evolved);

    assert_eq!(monitor.count(MonitorErrorKind::TypeMismatch), 1);

    // A byte-identical re-announcement is benign.
    handler.add_schema(registration("EvolvingType"));
    assert_eq!(monitor.count(MonitorErrorKind::TypeMismatch), 1);

    handler.add_data(&topic("rt/evolving", "EvolvingType"), sample(&pool, b"v1"));
    handler.stop();
    drop(handler);

    let messages = read_all_messages(&dir);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0.as_deref(), Some("EvolvingType"));
}

#[test]
fn test_promotion_spans_multiple_topics_of_one_type() {
    // Pending samples are indexed by type, not topic: one schema promotes
    // samples from every topic carrying that type.
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let pool = Arc::new(HeapPayloadPool::new());
    let handler = McapHandler::new(
        &config,
        pool.clone(),
        RecorderState::Running,
        None,
        Arc::new(NoopMonitor),
    )
    .unwrap();

    handler.add_data(&topic("rt/left", "SharedType"), sample(&pool, b"left"));
    handler.add_data(&topic("rt/right", "SharedType"), sample(&pool, b"right"));
    assert_eq!(handler.pending_samples(), 2);

    handler.add_schema(registration("SharedType"));
    assert_eq!(handler.pending_samples(), 0);
    assert_eq!(handler.buffered_samples(), 2);

    handler.stop();
    drop(handler);

    let messages = read_all_messages(&dir);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].1, b"left");
    assert_eq!(messages[1].1, b"right");
}
