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

/// PAUSED-state tests: event window retention, trigger semantics, pending
/// promotion while paused
///
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use dds_recorder::config::RecorderConfig;
use dds_recorder::{
    now_nanos, HeapPayloadPool, McapHandler, NoopMonitor, PayloadPool, RecorderState, SampleData,
    TopicDescriptor, TopicQos, TypeRegistration,
};
use tempfile::TempDir;

fn paused_config(dir: &TempDir) -> RecorderConfig {
    let mut config = RecorderConfig::default();
    config.output.directory = dir.path().to_string_lossy().to_string();
    config.output.prefix = "event".to_string();
    config.storage.max_size = 64 * 1024 * 1024;
    config.storage.safety_margin = 1024;
    config.storage.compression = dds_recorder::CompressionType::None;
    config.handler.buffer_size = 1000;
    config.handler.max_pending_samples = 100;
    // Short window and fast trims so the tests stay quick; assertions leave
    // generous slack around both.
    config.handler.event_window_seconds = 0.4;
    config.handler.cleanup_period_seconds = 0.1;
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

fn read_sequences(dir: &TempDir) -> Vec<u32> {
    let mut sequences = Vec::new();
    for path in mcap_files(dir) {
        let contents = std::fs::read(&path).unwrap();
        for message in mcap::MessageStream::new(&contents).unwrap() {
            sequences.push(message.unwrap().sequence);
        }
    }
    sequences
}

#[test]
fn test_trigger_dumps_only_the_event_window() {
    let dir = TempDir::new().unwrap();
    let config = paused_config(&dir);
    let pool = Arc::new(HeapPayloadPool::new());
    let handler = McapHandler::new(
        &config,
        pool.clone(),
        RecorderState::Paused,
        None,
        Arc::new(NoopMonitor),
    )
    .unwrap();

    handler.add_schema(registration("WindowType"));

    // Five samples that will fall out of the window.
    for index in 0..5 {
        handler.add_data(
            &topic("rt/window", "WindowType"),
            sample(&pool, format!("old-{index}").as_bytes()),
        );
    }

    // Wait well past window + cleanup period so the trim has happened.
    sleep(Duration::from_millis(800));
    assert_eq!(handler.buffered_samples(), 0);

    // Three fresh samples, then the event.
    for index in 0..3 {
        handler.add_data(
            &topic("rt/window", "WindowType"),
            sample(&pool, format!("fresh-{index}").as_bytes()),
        );
    }
    handler.trigger_event();

    // Give the event thread time to wake up and dump.
    sleep(Duration::from_millis(300));
    assert_eq!(handler.buffered_samples(), 0);

    handler.stop();
    drop(handler);

    let sequences = read_sequences(&dir);
    assert_eq!(sequences, vec![5, 6, 7]);
}

#[test]
fn test_pause_without_trigger_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = paused_config(&dir);
    let pool = Arc::new(HeapPayloadPool::new());
    let handler = McapHandler::new(
        &config,
        pool.clone(),
        RecorderState::Paused,
        None,
        Arc::new(NoopMonitor),
    )
    .unwrap();

    handler.add_schema(registration("WindowType"));
    for _ in 0..4 {
        handler.add_data(&topic("rt/window", "WindowType"), sample(&pool, b"held"));
    }

    handler.stop();
    drop(handler);

    assert!(read_sequences(&dir).is_empty());
}

#[test]
fn test_trigger_outside_paused_is_ineffective() {
    let dir = TempDir::new().unwrap();
    let config = paused_config(&dir);
    let pool = Arc::new(HeapPayloadPool::new());
    let handler = McapHandler::new(
        &config,
        pool.clone(),
        RecorderState::Running,
        None,
        Arc::new(NoopMonitor),
    )
    .unwrap();

    handler.trigger_event();
    assert_eq!(handler.state(), RecorderState::Running);

    handler.add_schema(registration("WindowType"));
    handler.add_data(&topic("rt/window", "WindowType"), sample(&pool, b"running"));
    handler.stop();
    handler.trigger_event();
    drop(handler);

    // Only the RUNNING-state message is on disk.
    assert_eq!(read_sequences(&dir).len(), 1);
}

#[test]
fn test_repeated_triggers_do_not_duplicate_samples() {
    let dir = TempDir::new().unwrap();
    let config = paused_config(&dir);
    let pool = Arc::new(HeapPayloadPool::new());
    let handler = McapHandler::new(
        &config,
        pool.clone(),
        RecorderState::Paused,
        None,
        Arc::new(NoopMonitor),
    )
    .unwrap();

    handler.add_schema(registration("WindowType"));

    handler.add_data(&topic("rt/window", "WindowType"), sample(&pool, b"a"));
    handler.add_data(&topic("rt/window", "WindowType"), sample(&pool, b"b"));
    handler.trigger_event();
    sleep(Duration::from_millis(300));

    handler.add_data(&topic("rt/window", "WindowType"), sample(&pool, b"c"));
    handler.trigger_event();
    sleep(Duration::from_millis(300));

    handler.stop();
    drop(handler);

    let sequences = read_sequences(&dir);
    assert_eq!(sequences, vec![0, 1, 2]);
}

#[test]
fn test_paused_pending_joins_the_window_once_schema_arrives() {
    let dir = TempDir::new().unwrap();
    let config = paused_config(&dir);
    let pool = Arc::new(HeapPayloadPool::new());
    let handler = McapHandler::new(
        &config,
        pool.clone(),
        RecorderState::Paused,
        None,
        Arc::new(NoopMonitor),
    )
    .unwrap();

    for index in 0..4 {
        handler.add_data(
            &topic("rt/window", "LateWindowType"),
            sample(&pool, format!("held-{index}").as_bytes()),
        );
    }
    assert_eq!(handler.pending_samples_paused(), 4);
    assert_eq!(handler.buffered_samples(), 0);

    handler.add_schema(registration("LateWindowType"));
    assert_eq!(handler.pending_samples_paused(), 0);
    assert_eq!(handler.buffered_samples(), 4);

    handler.trigger_event();
    sleep(Duration::from_millis(300));

    handler.stop();
    drop(handler);

    let sequences = read_sequences(&dir);
    assert_eq!(sequences, vec![0, 1, 2, 3]);
}

#[test]
fn test_running_era_pending_is_written_even_while_paused() {
    // Samples that were pending before the pause predate the window; their
    // schema arriving during PAUSED writes them straight to the file.
    let dir = TempDir::new().unwrap();
    let mut config = paused_config(&dir);
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

    handler.add_data(
        &topic("rt/window", "LateWindowType"),
        sample(&pool, b"pre-pause"),
    );
    assert_eq!(handler.pending_samples(), 1);

    handler.pause().unwrap();
    assert_eq!(handler.pending_samples(), 1);

    handler.add_schema(registration("LateWindowType"));
    assert_eq!(handler.pending_samples(), 0);
    // Written directly, not buffered: the window must not trim it.
    assert_eq!(handler.buffered_samples(), 0);

    handler.stop();
    drop(handler);

    let sequences = read_sequences(&dir);
    assert_eq!(sequences, vec![0]);
}
