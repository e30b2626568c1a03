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

/// Recording state machine
///
/// The handler sits between the subscription layer and the MCAP writer. It
/// owns the in-memory message buffer, the pending-sample store for messages
/// that arrive before their schema, and the event thread that maintains the
/// sliding retention window while PAUSED.
///
/// # Thread Safety
///
/// `add_data` and `add_schema` may be called from any number of producer
/// threads; one mutex serializes them against the command methods. The
/// command methods themselves (`start`, `pause`, `stop`, `trigger_event`)
/// are not mutually thread safe and must be called sequentially from a
/// single thread.
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::config::{HandlerConfig, RecorderConfig};
use crate::dynamic_types::{DynamicTypeEntry, DynamicTypesCollection};
use crate::error::RecorderError;
use crate::file_tracker::FileTracker;
use crate::mcap_writer::{ChannelSpec, DiskFullCallback, McapWriter, SchemaSpec};
use crate::message::{now_nanos, Message, SampleData};
use crate::monitor::{MonitorErrorKind, RecorderMonitor};
use crate::payload::PayloadPool;
use crate::pending::{PendingSample, PendingStore};
use crate::topic::{TopicDescriptor, TopicKey};

/// Name of the placeholder schema bound to channels whose type is unknown.
pub const BLANK_SCHEMA_NAME: &str = "";

/// Message encoding recorded for every channel.
const MESSAGE_ENCODING: &str = "cdr";

/// State of the handler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Received messages are not processed.
    Stopped,
    /// Messages are buffered and dumped to disk when the buffer fills.
    Running,
    /// Messages are buffered and dumped to disk when an event triggers.
    Paused,
}

/// Flag controlling the event thread routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventCode {
    /// Waiting for an event.
    Untriggered,
    /// An event has been triggered.
    Triggered,
    /// The event thread must exit.
    Stopped,
}

/// A newly discovered type as announced by the schema source: the generated
/// schema text plus the opaque serialized identifier and object kept for the
/// dynamic-types attachment.
#[derive(Debug, Clone)]
pub struct TypeRegistration {
    pub type_name: String,
    pub encoding: String,
    pub schema_data: Vec<u8>,
    pub type_identifier: Vec<u8>,
    pub type_object: Vec<u8>,
}

#[derive(Debug, Clone)]
struct ChannelRecord {
    id: u16,
    schema_id: u16,
    topic: TopicDescriptor,
}

struct Inner {
    state: RecorderState,
    /// Type name -> writer schema id, blank schema excluded.
    schemas: HashMap<String, u16>,
    blank_schema_id: Option<u16>,
    channels: HashMap<TopicKey, ChannelRecord>,
    /// Per-topic sample counters driving downsampling.
    topic_counters: HashMap<TopicKey, u64>,
    buffer: Vec<Message>,
    dynamic_types: DynamicTypesCollection,
    pending: PendingStore,
    sequence: u32,
}

impl Inner {
    fn next_sequence(&mut self) -> u32 {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        sequence
    }
}

struct EventSync {
    flag: Mutex<EventCode>,
    cv: Condvar,
}

impl EventSync {
    fn lock_flag(&self) -> MutexGuard<'_, EventCode> {
        match self.flag.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub struct McapHandler {
    config: HandlerConfig,
    payload_pool: Arc<dyn PayloadPool>,
    writer: Arc<McapWriter>,
    inner: Arc<Mutex<Inner>>,
    event: Arc<EventSync>,
    event_thread: Mutex<Option<JoinHandle<()>>>,
    monitor: Arc<dyn RecorderMonitor>,
}

impl McapHandler {
    /// Create a handler and bring it into `init_state`.
    ///
    /// A writing initial state opens the first file immediately; failure to
    /// create it is returned as [`RecorderError::Initialization`], while a
    /// full disk fires `on_disk_full` and leaves the writer disabled.
    ///
    /// The callback and the monitor may be invoked with internal locks held
    /// and must not call back into the handler.
    pub fn new(
        config: &RecorderConfig,
        payload_pool: Arc<dyn PayloadPool>,
        init_state: RecorderState,
        on_disk_full: Option<DiskFullCallback>,
        monitor: Arc<dyn RecorderMonitor>,
    ) -> Result<Self, RecorderError> {
        let files = FileTracker::new(&config.output, &config.storage)?;
        let writer = Arc::new(McapWriter::new(
            &config.storage,
            config.handler.record_types,
            files,
            monitor.clone(),
        ));

        if let Some(callback) = on_disk_full {
            writer.set_on_disk_full_callback(callback);
        }

        let handler = Self {
            config: config.handler.clone(),
            payload_pool,
            writer,
            inner: Arc::new(Mutex::new(Inner {
                state: RecorderState::Stopped,
                schemas: HashMap::new(),
                blank_schema_id: None,
                channels: HashMap::new(),
                topic_counters: HashMap::new(),
                buffer: Vec::new(),
                dynamic_types: DynamicTypesCollection::new(),
                pending: PendingStore::new(config.handler.max_pending_samples),
                sequence: 0,
            })),
            event: Arc::new(EventSync {
                flag: Mutex::new(EventCode::Stopped),
                cv: Condvar::new(),
            }),
            event_thread: Mutex::new(None),
            monitor,
        };

        match init_state {
            RecorderState::Stopped => {}
            RecorderState::Running => handler.start()?,
            RecorderState::Paused => handler.pause()?,
        }

        Ok(handler)
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Pool that owns every payload referenced by buffered messages.
    pub fn payload_pool(&self) -> &Arc<dyn PayloadPool> {
        &self.payload_pool
    }

    pub fn state(&self) -> RecorderState {
        self.lock_inner().state
    }

    /// Messages currently held in the in-memory buffer.
    pub fn buffered_samples(&self) -> usize {
        self.lock_inner().buffer.len()
    }

    /// Samples waiting for their schema, received while RUNNING or STOPPED.
    pub fn pending_samples(&self) -> usize {
        self.lock_inner().pending.running_len()
    }

    /// Samples waiting for their schema, received while PAUSED.
    pub fn pending_samples_paused(&self) -> usize {
        self.lock_inner().pending.paused_len()
    }

    /// Ingest one sample for `topic`.
    ///
    /// Discarded outright when STOPPED. Otherwise the sample is buffered,
    /// written, or queued as pending according to the current state and the
    /// availability of the topic's schema; errors are handled in place.
    pub fn add_data(&self, topic: &TopicDescriptor, data: SampleData) {
        let mut inner = self.lock_inner();

        if inner.state == RecorderState::Stopped {
            trace!("Discarding sample of '{}': handler is stopped", topic.name);
            return;
        }

        let key = topic.key();

        // Downsampling: keep 1 in N per topic.
        let downsampling = self.config.downsampling.max(1) as u64;
        let counter = inner.topic_counters.entry(key.clone()).or_insert(0);
        let keep = *counter % downsampling == 0;
        *counter += 1;
        if !keep {
            trace!("Downsampling sample of '{}'", topic.name);
            return;
        }

        let sequence = inner.next_sequence();

        match inner.state {
            RecorderState::Running => {
                if let Some(channel_id) = self.try_bind_channel(&mut inner, topic, &key) {
                    let message = Message::bind(channel_id, sequence, data);
                    self.push_buffer(&mut inner, message);
                } else if self.config.max_pending_samples == 0 {
                    if self.config.only_with_schema {
                        debug!(
                            "Discarding sample of unknown type '{}' (pending disabled)",
                            topic.type_name
                        );
                        return;
                    }
                    match self.blank_channel(&mut inner, topic, &key) {
                        Ok(channel_id) => {
                            let message = Message::bind(channel_id, sequence, data);
                            self.push_buffer(&mut inner, message);
                        }
                        Err(bind_error) => {
                            warn!(
                                "Discarding sample of '{}': {}",
                                topic.type_name, bind_error
                            );
                        }
                    }
                } else {
                    let pending = PendingSample { sequence, data };
                    let overflow = inner.pending.push_running(topic, pending);
                    if let Some((overflow_topic, overflow_sample)) = overflow {
                        self.write_overflow(&mut inner, overflow_topic, overflow_sample);
                    }
                }
            }
            RecorderState::Paused => {
                if let Some(channel_id) = self.try_bind_channel(&mut inner, topic, &key) {
                    inner
                        .buffer
                        .push(Message::bind(channel_id, sequence, data));
                } else {
                    // Always queued, whatever the pending configuration: the
                    // sample must stay eligible for the event window.
                    inner
                        .pending
                        .push_paused(topic, PendingSample { sequence, data });
                }
            }
            RecorderState::Stopped => unreachable!("handled above"),
        }
    }

    /// Register the schema for a type.
    ///
    /// Channels previously bound to the blank schema for this type are
    /// rebound, and every pending sample of the type is promoted. A schema
    /// arriving for a type already bound to different content is rejected.
    pub fn add_schema(&self, registration: TypeRegistration) {
        let mut inner = self.lock_inner();

        if let Some(&existing_id) = inner.schemas.get(&registration.type_name) {
            if self.writer.schema_matches(
                existing_id,
                &registration.encoding,
                &registration.schema_data,
            ) {
                debug!("Schema for type '{}' already known", registration.type_name);
            } else {
                warn!(
                    "Rejecting schema update for type '{}': existing channels keep their schema",
                    registration.type_name
                );
                self.monitor.on_error(MonitorErrorKind::TypeMismatch);
            }
            return;
        }

        info!("Adding schema for type '{}'", registration.type_name);

        let schema_id = self.writer.write_schema(SchemaSpec {
            name: registration.type_name.clone(),
            encoding: registration.encoding.clone(),
            data: registration.schema_data.clone(),
        });
        inner
            .schemas
            .insert(registration.type_name.clone(), schema_id);

        if self.config.record_types {
            let added = inner.dynamic_types.insert(DynamicTypeEntry {
                type_name: registration.type_name.clone(),
                type_identifier: registration.type_identifier,
                type_object: registration.type_object,
            });
            if added {
                let payload = inner.dynamic_types.serialize();
                self.writer.update_dynamic_types(payload);
            }
        }

        self.rebind_blank_channels(&mut inner, &registration.type_name, schema_id);
        self.promote_pending(&mut inner, &registration.type_name);
    }

    /// Start recording. No-op when already RUNNING.
    pub fn start(&self) -> Result<(), RecorderError> {
        let previous = {
            let mut inner = self.lock_inner();
            let previous = inner.state;
            if previous == RecorderState::Running {
                debug!("Handler already running");
                return Ok(());
            }
            inner.state = RecorderState::Running;
            previous
        };

        info!("Starting recorder (was {:?})", previous);

        if previous == RecorderState::Paused {
            self.stop_event_thread();
        }

        self.writer.enable()?;

        if previous == RecorderState::Stopped && !self.config.only_with_schema {
            let mut inner = self.lock_inner();
            self.flush_pending_samples(&mut inner);
        }

        Ok(())
    }

    /// Pause recording, retaining only the event window. No-op when already
    /// PAUSED.
    pub fn pause(&self) -> Result<(), RecorderError> {
        let previous = {
            let mut inner = self.lock_inner();
            let previous = inner.state;
            if previous == RecorderState::Paused {
                debug!("Handler already paused");
                return Ok(());
            }
            inner.state = RecorderState::Paused;
            previous
        };

        info!("Pausing recorder (was {:?})", previous);

        if previous == RecorderState::Running {
            let mut inner = self.lock_inner();
            self.dump_buffer(&mut inner);
            if !self.config.only_with_schema {
                self.flush_pending_samples(&mut inner);
            }
        }

        self.writer.enable()?;
        self.start_event_thread();

        Ok(())
    }

    /// Stop recording, flushing buffers and closing the current file. No-op
    /// when already STOPPED.
    pub fn stop(&self) {
        self.stop_with(false);
    }

    fn stop_with(&self, on_destruction: bool) {
        let previous = {
            let mut inner = self.lock_inner();
            let previous = inner.state;
            if previous == RecorderState::Stopped && !on_destruction {
                debug!("Handler already stopped");
                return;
            }
            inner.state = RecorderState::Stopped;
            previous
        };

        if previous == RecorderState::Stopped {
            // Destruction after an explicit stop: everything is flushed,
            // just make sure the writer is closed.
            self.writer.disable();
            return;
        }

        info!("Stopping recorder (was {:?})", previous);

        if previous == RecorderState::Paused {
            self.stop_event_thread();
        }

        {
            let mut inner = self.lock_inner();
            if previous == RecorderState::Running {
                self.dump_buffer(&mut inner);
            }
            if !self.config.only_with_schema {
                self.flush_pending_samples(&mut inner);
            }
            // Channels do not survive the file sequence; cleared here in
            // lockstep with the writer's own channel map.
            inner.channels.clear();
        }

        self.writer.disable();
    }

    /// Dump the event window to disk. Ineffective outside PAUSED.
    pub fn trigger_event(&self) {
        {
            let inner = self.lock_inner();
            if inner.state != RecorderState::Paused {
                debug!("Event triggered outside PAUSED, ignoring");
                return;
            }
        }

        info!("Event triggered");

        let mut flag = self.event.lock_flag();
        *flag = EventCode::Triggered;
        self.event.cv.notify_one();
    }

    fn push_buffer(&self, inner: &mut Inner, message: Message) {
        inner.buffer.push(message);

        if inner.state == RecorderState::Running && inner.buffer.len() >= self.config.buffer_size {
            debug!(
                "Buffer reached {} messages, dumping to file",
                inner.buffer.len()
            );
            self.dump_buffer(inner);
        }
    }

    fn dump_buffer(&self, inner: &mut Inner) {
        Self::dump_buffer_inner(inner, &self.writer);
    }

    fn dump_buffer_inner(inner: &mut Inner, writer: &McapWriter) {
        for message in inner.buffer.drain(..) {
            writer.write_message(&message);
        }
    }

    /// Channel lookup for ingestion: an existing channel with a real schema,
    /// or a fresh one if the type's schema is known. Never creates blank
    /// channels.
    fn try_bind_channel(
        &self,
        inner: &mut Inner,
        topic: &TopicDescriptor,
        key: &TopicKey,
    ) -> Option<u16> {
        if let Some(record) = inner.channels.get(key) {
            if Some(record.schema_id) == inner.blank_schema_id {
                return None;
            }
            return Some(record.id);
        }

        let schema_id = *inner.schemas.get(&topic.type_name)?;

        self.check_topic_collisions(inner, key);
        Some(self.create_channel(inner, topic, schema_id))
    }

    /// Channel bound to the blank schema for a topic whose type is unknown.
    fn blank_channel(
        &self,
        inner: &mut Inner,
        topic: &TopicDescriptor,
        key: &TopicKey,
    ) -> Result<u16, RecorderError> {
        if self.config.only_with_schema {
            return Err(RecorderError::Inconsistency(format!(
                "no schema for type '{}' and only_with_schema is set",
                topic.type_name
            )));
        }

        if let Some(record) = inner.channels.get(key) {
            return Ok(record.id);
        }

        let blank_schema_id = match inner.blank_schema_id {
            Some(id) => id,
            None => {
                let id = self.writer.write_schema(SchemaSpec {
                    name: BLANK_SCHEMA_NAME.to_string(),
                    encoding: String::new(),
                    data: Vec::new(),
                });
                inner.blank_schema_id = Some(id);
                id
            }
        };

        self.check_topic_collisions(inner, key);
        Ok(self.create_channel(inner, topic, blank_schema_id))
    }

    fn check_topic_collisions(&self, inner: &Inner, key: &TopicKey) {
        for existing in inner.channels.keys() {
            if existing.name != key.name {
                continue;
            }
            if existing.type_name != key.type_name {
                warn!(
                    "Topic '{}' reappeared with type '{}' (previously '{}')",
                    key.name, key.type_name, existing.type_name
                );
                self.monitor.on_error(MonitorErrorKind::TypeMismatch);
            } else if existing.qos_signature != key.qos_signature {
                warn!("Topic '{}' reappeared with different QoS", key.name);
                self.monitor.on_error(MonitorErrorKind::QosMismatch);
            }
        }
    }

    /// Create (or replace) the channel for `topic`, bound to `schema_id`.
    fn create_channel(&self, inner: &mut Inner, topic: &TopicDescriptor, schema_id: u16) -> u16 {
        let mut metadata = BTreeMap::new();
        metadata.insert("qos".to_string(), topic.qos.signature());
        metadata.insert("type_name".to_string(), topic.type_name.clone());

        let id = self.writer.write_channel(ChannelSpec {
            topic: topic.name.clone(),
            message_encoding: MESSAGE_ENCODING.to_string(),
            schema_id,
            metadata,
        });

        inner.channels.insert(
            topic.key(),
            ChannelRecord {
                id,
                schema_id,
                topic: topic.clone(),
            },
        );

        id
    }

    /// Oldest pending sample popped by an overflowing queue: written under
    /// the blank schema when allowed, discarded otherwise.
    fn write_overflow(&self, inner: &mut Inner, topic: TopicDescriptor, sample: PendingSample) {
        if self.config.only_with_schema {
            debug!(
                "Discarding oldest pending sample of type '{}' (queue full)",
                topic.type_name
            );
            return;
        }

        let key = topic.key();
        match self.blank_channel(inner, &topic, &key) {
            Ok(channel_id) => {
                let message = Message::bind(channel_id, sample.sequence, sample.data);
                self.push_buffer(inner, message);
            }
            Err(bind_error) => {
                debug!(
                    "Discarding oldest pending sample of type '{}': {}",
                    topic.type_name, bind_error
                );
            }
        }
    }

    /// Rebind every blank channel of `type_name` to the newly known schema.
    /// The rebinding creates a fresh channel; messages written so far keep
    /// the blank one.
    fn rebind_blank_channels(&self, inner: &mut Inner, type_name: &str, schema_id: u16) {
        let Some(blank_schema_id) = inner.blank_schema_id else {
            return;
        };

        let keys: Vec<TopicKey> = inner
            .channels
            .iter()
            .filter(|(key, record)| {
                record.schema_id == blank_schema_id && key.type_name == type_name
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in keys {
            let topic = inner.channels[&key].topic.clone();
            debug!(
                "Rebinding channel for topic '{}' to schema '{}'",
                topic.name, type_name
            );
            self.create_channel(inner, &topic, schema_id);
        }
    }

    /// Promote every pending sample of `type_name` now that its schema is
    /// known.
    fn promote_pending(&self, inner: &mut Inner, type_name: &str) {
        let state = inner.state;

        let running_era = inner.pending.take_running(type_name);
        if !running_era.is_empty() {
            debug!(
                "Promoting {} pending samples of type '{}'",
                running_era.len(),
                type_name
            );
        }
        for (topic, pending) in running_era {
            let key = topic.key();
            let Some(channel_id) = self.try_bind_channel(inner, &topic, &key) else {
                warn!(
                    "Dropping promoted sample: no channel available for '{}'",
                    topic.name
                );
                continue;
            };
            let message = Message::bind(channel_id, pending.sequence, pending.data);

            if state == RecorderState::Paused {
                // These predate PAUSED and must not be trimmed by the event
                // window: straight to the file.
                self.writer.write_message(&message);
            } else {
                self.push_buffer(inner, message);
            }
        }

        let paused_era = inner.pending.take_paused(type_name);
        for (topic, pending) in paused_era {
            let key = topic.key();
            let Some(channel_id) = self.try_bind_channel(inner, &topic, &key) else {
                continue;
            };
            inner
                .buffer
                .push(Message::bind(channel_id, pending.sequence, pending.data));
        }
    }

    /// Write every RUNNING-era pending sample to the file under the blank
    /// schema. Callers gate on `only_with_schema`.
    fn flush_pending_samples(&self, inner: &mut Inner) {
        let drained = inner.pending.drain_running();
        if drained.is_empty() {
            return;
        }

        debug!("Flushing {} pending samples without schema", drained.len());

        for (topic, pending) in drained {
            let key = topic.key();
            match self.blank_channel(inner, &topic, &key) {
                Ok(channel_id) => {
                    let message = Message::bind(channel_id, pending.sequence, pending.data);
                    self.writer.write_message(&message);
                }
                Err(bind_error) => {
                    debug!(
                        "Discarding pending sample of type '{}': {}",
                        topic.type_name, bind_error
                    );
                }
            }
        }
    }

    fn start_event_thread(&self) {
        {
            let mut flag = self.event.lock_flag();
            *flag = EventCode::Untriggered;
        }

        let inner = Arc::clone(&self.inner);
        let writer = Arc::clone(&self.writer);
        let event = Arc::clone(&self.event);
        let window = self.config.event_window();
        let period = self.config.cleanup_period();

        let spawned = thread::Builder::new()
            .name("recorder-event".to_string())
            .spawn(move || Self::event_thread_routine(inner, writer, event, window, period));

        match spawned {
            Ok(handle) => {
                let mut slot = match self.event_thread.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                *slot = Some(handle);
            }
            Err(spawn_error) => error!("Failed to spawn event thread: {}", spawn_error),
        }
    }

    /// Signal the event thread to exit, join it, and clear the buffer and
    /// the paused pending store.
    fn stop_event_thread(&self) {
        let handle = {
            let mut slot = match self.event_thread.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.take()
        };

        if let Some(handle) = handle {
            debug!("Stopping event thread");
            {
                let mut flag = self.event.lock_flag();
                *flag = EventCode::Stopped;
            }
            self.event.cv.notify_all();
            if handle.join().is_err() {
                error!("Event thread panicked");
            }
        }

        let mut inner = self.lock_inner();
        inner.buffer.clear();
        inner.pending.clear_paused();
    }

    /// Wait for events with a periodic wake-up that trims the buffer to the
    /// event window. Exits when the flag is set to `Stopped`.
    fn event_thread_routine(
        inner: Arc<Mutex<Inner>>,
        writer: Arc<McapWriter>,
        event: Arc<EventSync>,
        window: Duration,
        period: Duration,
    ) {
        debug!("Event thread started");

        let mut flag = event.lock_flag();
        loop {
            let wait_result =
                event
                    .cv
                    .wait_timeout_while(flag, period, |code| *code == EventCode::Untriggered);
            let (guard, _timed_out) = match wait_result {
                Ok(pair) => pair,
                Err(poisoned) => poisoned.into_inner(),
            };
            flag = guard;

            match *flag {
                EventCode::Stopped => break,
                code => {
                    let triggered = code == EventCode::Triggered;
                    if triggered {
                        *flag = EventCode::Untriggered;
                    }
                    // Never hold the flag lock while touching handler state.
                    drop(flag);

                    {
                        let mut inner_guard = match inner.lock() {
                            Ok(guard) => guard,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        if inner_guard.state == RecorderState::Paused {
                            Self::remove_outdated_samples(&mut inner_guard, window);
                            if triggered {
                                debug!(
                                    "Dumping {} samples for triggered event",
                                    inner_guard.buffer.len()
                                );
                                Self::dump_buffer_inner(&mut inner_guard, &writer);
                            }
                        }
                    }

                    flag = event.lock_flag();
                }
            }
        }

        debug!("Event thread exiting");
    }

    /// Remove buffered samples older than `now - window`.
    fn remove_outdated_samples(inner: &mut Inner, window: Duration) {
        let cutoff = now_nanos().saturating_sub(window.as_nanos() as u64);
        let before = inner.buffer.len();
        inner.buffer.retain(|message| message.log_time_ns >= cutoff);

        let removed = before - inner.buffer.len();
        if removed > 0 {
            trace!("Trimmed {} samples older than the event window", removed);
        }
    }
}

impl Drop for McapHandler {
    fn drop(&mut self) {
        self.stop_with(true);
    }
}
