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

/// MCAP container writer with size-bounded file rotation
///
/// Wraps the `mcap` crate writer and owns the file sequence. Schemas and
/// channels registered here are carried between files: every fresh file
/// re-emits the version metadata, all known schemas and all known channels
/// before any message, so each produced file is independently decodable.
///
/// Two failure modes are handled in place:
/// - full file: the current file is closed and renamed, a new one is opened
///   large enough for the replayed records plus the write that did not fit,
///   and the write is retried;
/// - full disk: the disk-full callback fires, the writer disables itself and
///   all subsequent writes are dropped until an explicit re-enable.
///
/// # Thread Safety
///
/// All methods take `&self`; internal state lives behind a mutex, so the
/// ingestion path and the command path can share one writer.
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufWriter;
use std::sync::{Arc, Mutex, MutexGuard};

use mcap::records::MessageHeader;
use tracing::{debug, error, info, warn};

use crate::config::{CompressionType, StorageConfig};
use crate::dynamic_types::{DYNAMIC_TYPES_ATTACHMENT_NAME, DYNAMIC_TYPES_MEDIA_TYPE};
use crate::error::RecorderError;
use crate::file_tracker::FileTracker;
use crate::message::{now_nanos, Message};
use crate::monitor::{MonitorErrorKind, RecorderMonitor};
use crate::size_tracker::SizeTracker;

/// Disk-space floor requested for a fresh, empty file.
pub const MIN_MCAP_SIZE: u64 = 4096;

/// Name of the metadata record identifying the recorder build.
pub const VERSION_METADATA_NAME: &str = "version";
const VERSION_METADATA_RELEASE: &str = "release";
const VERSION_METADATA_COMMIT: &str = "commit";

/// Callback invoked when no further file can be opened.
pub type DiskFullCallback = Box<dyn Fn() + Send + Sync>;

/// A schema as registered with the writer. The id handed back by
/// [`McapWriter::write_schema`] is stable across file rotation.
#[derive(Debug, Clone)]
pub struct SchemaSpec {
    pub name: String,
    pub encoding: String,
    pub data: Vec<u8>,
}

/// A channel as registered with the writer; `schema_id` refers to a writer
/// schema id, not a container-level one.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub topic: String,
    pub message_encoding: String,
    pub schema_id: u16,
    pub metadata: BTreeMap<String, String>,
}

pub struct McapWriter {
    inner: Mutex<WriterInner>,
    monitor: Arc<dyn RecorderMonitor>,
}

struct WriterInner {
    enabled: bool,
    record_types: bool,
    compression: CompressionType,
    safety_margin: u64,
    mcap: Option<mcap::Writer<BufWriter<File>>>,
    size: SizeTracker,
    files: FileTracker,
    /// Writer-assigned ids, stable for the writer's lifetime. Iterated in id
    /// order when replaying into a new file.
    schemas: BTreeMap<u16, SchemaSpec>,
    channels: BTreeMap<u16, ChannelSpec>,
    next_schema_id: u16,
    next_channel_id: u16,
    /// Writer id -> container id inside the currently open file. Rebuilt by
    /// the replay pass on every new file.
    schema_file_ids: HashMap<u16, u16>,
    channel_file_ids: HashMap<u16, u16>,
    dynamic_types_payload: Option<Vec<u8>>,
    on_disk_full: Option<DiskFullCallback>,
}

impl McapWriter {
    pub fn new(
        storage: &StorageConfig,
        record_types: bool,
        files: FileTracker,
        monitor: Arc<dyn RecorderMonitor>,
    ) -> Self {
        Self {
            inner: Mutex::new(WriterInner {
                enabled: false,
                record_types,
                compression: storage.compression,
                safety_margin: storage.safety_margin,
                mcap: None,
                size: SizeTracker::new(),
                files,
                schemas: BTreeMap::new(),
                channels: BTreeMap::new(),
                next_schema_id: 1,
                next_channel_id: 0,
                schema_file_ids: HashMap::new(),
                channel_file_ids: HashMap::new(),
                dynamic_types_payload: None,
                on_disk_full: None,
            }),
            monitor,
        }
    }

    fn lock(&self) -> MutexGuard<'_, WriterInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_on_disk_full_callback(&self, callback: DiskFullCallback) {
        self.lock().on_disk_full = Some(callback);
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Whether the registered schema `id` has exactly this encoding and
    /// content. Used to tell benign re-announcements from type evolution.
    pub fn schema_matches(&self, id: u16, encoding: &str, data: &[u8]) -> bool {
        let inner = self.lock();
        inner
            .schemas
            .get(&id)
            .is_some_and(|spec| spec.encoding == encoding && spec.data == data)
    }

    /// Open a new file and start accepting writes. Idempotent.
    ///
    /// A full disk is reported through the disk-full callback and leaves the
    /// writer disabled; only a failure to create or open the file itself is
    /// returned as [`RecorderError::Initialization`].
    pub fn enable(&self) -> Result<(), RecorderError> {
        let mut inner = self.lock();

        if inner.enabled {
            return Ok(());
        }

        info!("Enabling MCAP writer");

        match Self::open_new_file(&mut inner, &self.monitor, MIN_MCAP_SIZE) {
            Ok(()) => {
                inner.enabled = true;
                Ok(())
            }
            Err(RecorderError::FullDisk(reason)) => {
                error!("Error opening a new recording file: {}", reason);
                Self::handle_disk_full(&mut inner, &self.monitor);
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Write the dynamic-types attachment, close and rename the current
    /// file, and stop accepting writes. Idempotent.
    ///
    /// Channels are forgotten so re-enabling starts from a clean channel map;
    /// schemas persist and are re-emitted into every later file.
    pub fn disable(&self) {
        let mut inner = self.lock();

        if !inner.enabled {
            return;
        }

        info!("Disabling MCAP writer");

        Self::close_current_file(&mut inner);
        inner.channels.clear();
        inner.channel_file_ids.clear();
        inner.enabled = false;
    }

    /// Register a schema and emit it into the current file. Returns the
    /// writer-level schema id.
    pub fn write_schema(&self, spec: SchemaSpec) -> u16 {
        let mut inner = self.lock();

        let id = inner.next_schema_id;
        inner.next_schema_id += 1;

        debug!("Writing schema '{}' as id {}", spec.name, id);
        inner.schemas.insert(id, spec);

        if inner.enabled {
            match Self::emit_schema(&mut inner, id) {
                Ok(()) => {}
                Err(RecorderError::FullFile { data_size }) => {
                    // Rotation replays every registered schema, including
                    // this one.
                    match Self::rotate(&mut inner, &self.monitor, data_size) {
                        Ok(()) => {}
                        Err(RecorderError::FullDisk(reason)) => {
                            error!("Disk is full: {}", reason);
                            Self::handle_disk_full(&mut inner, &self.monitor);
                        }
                        Err(error) => error!("Error rotating recording file: {}", error),
                    }
                }
                Err(error) => error!("Error writing schema: {}", error),
            }
            Self::publish_size(&mut inner);
        }

        id
    }

    /// Register a channel and emit it into the current file. Returns the
    /// writer-level channel id.
    pub fn write_channel(&self, spec: ChannelSpec) -> u16 {
        let mut inner = self.lock();

        let id = inner.next_channel_id;
        inner.next_channel_id += 1;

        debug!("Writing channel '{}' as id {}", spec.topic, id);
        inner.channels.insert(id, spec);

        if inner.enabled {
            match Self::emit_channel(&mut inner, id) {
                Ok(()) => {}
                Err(RecorderError::FullFile { data_size }) => {
                    match Self::rotate(&mut inner, &self.monitor, data_size) {
                        Ok(()) => {}
                        Err(RecorderError::FullDisk(reason)) => {
                            error!("Disk is full: {}", reason);
                            Self::handle_disk_full(&mut inner, &self.monitor);
                        }
                        Err(error) => error!("Error rotating recording file: {}", error),
                    }
                }
                Err(error) => error!("Error writing channel: {}", error),
            }
            Self::publish_size(&mut inner);
        }

        id
    }

    /// Write a message. Full files trigger rotation and one retry; any other
    /// failure drops the message and recording continues.
    pub fn write_message(&self, message: &Message) {
        let mut inner = self.lock();

        if !inner.enabled {
            warn!("Attempting to write a message in a disabled writer");
            return;
        }

        match Self::try_write_message(&mut inner, message) {
            Ok(()) => {}
            Err(RecorderError::FullFile { data_size }) => {
                match Self::rotate(&mut inner, &self.monitor, data_size) {
                    Ok(()) => {
                        if let Err(error) = Self::try_write_message(&mut inner, message) {
                            error!("Error writing message after rotation: {}", error);
                        }
                    }
                    Err(RecorderError::FullDisk(reason)) => {
                        error!("Disk is full: {}", reason);
                        Self::handle_disk_full(&mut inner, &self.monitor);
                    }
                    Err(error) => error!("Error rotating recording file: {}", error),
                }
            }
            Err(error) => error!("Error writing message: {}", error),
        }

        Self::publish_size(&mut inner);
    }

    /// Replace the stored dynamic-types payload, adjusting its reservation
    /// in the current file.
    pub fn update_dynamic_types(&self, payload: Vec<u8>) {
        let mut inner = self.lock();

        let new_len = payload.len() as u64;
        let old_len = inner
            .dynamic_types_payload
            .as_ref()
            .map(|payload| payload.len() as u64)
            .unwrap_or(0);

        if old_len == 0 {
            info!("Setting the dynamic types payload to {} B", new_len);
        } else {
            info!(
                "Updating the dynamic types payload from {} B to {} B",
                old_len, new_len
            );
        }

        if inner.enabled && inner.record_types {
            match inner.size.attachment_to_write(new_len, old_len) {
                Ok(()) => {}
                Err(RecorderError::FullFile { data_size }) => {
                    match Self::rotate(&mut inner, &self.monitor, data_size) {
                        Ok(()) => {
                            // The fresh file reserved the old payload; move
                            // the reservation to the new one.
                            if let Err(error) = inner.size.attachment_to_write(new_len, old_len) {
                                error!("Error reserving dynamic types attachment: {}", error);
                            }
                        }
                        Err(RecorderError::FullDisk(reason)) => {
                            error!("Disk is full: {}", reason);
                            Self::handle_disk_full(&mut inner, &self.monitor);
                        }
                        Err(error) => error!("Error rotating recording file: {}", error),
                    }
                }
                Err(error) => error!("Error reserving dynamic types attachment: {}", error),
            }
        }

        inner.dynamic_types_payload = Some(payload);
        Self::publish_size(&mut inner);
    }

    fn publish_size(inner: &mut WriterInner) {
        let potential = inner.size.potential_size();
        inner.files.set_current_file_size(potential);
    }

    fn handle_disk_full(inner: &mut WriterInner, monitor: &Arc<dyn RecorderMonitor>) {
        monitor.on_error(MonitorErrorKind::DiskFull);

        if let Some(callback) = inner.on_disk_full.as_ref() {
            callback();
        }
    }

    /// Open the next file in the sequence and replay the mandatory records.
    fn open_new_file(
        inner: &mut WriterInner,
        monitor: &Arc<dyn RecorderMonitor>,
        min_file_size: u64,
    ) -> Result<(), RecorderError> {
        inner.files.new_file(min_file_size)?;

        let path = inner
            .files
            .current_path()
            .ok_or_else(|| RecorderError::Inconsistency("no file after new_file".to_string()))?
            .to_path_buf();

        let file = match File::create(&path) {
            Ok(file) => file,
            Err(create_error) => {
                monitor.on_error(MonitorErrorKind::McapFileCreationFailure);
                inner.files.abandon_file();
                return Err(RecorderError::Initialization(format!(
                    "failed to create {}: {create_error}",
                    path.display()
                )));
            }
        };

        let options = mcap::WriteOptions::new().compression(inner.compression.to_mcap());
        let writer = match options.create(BufWriter::new(file)) {
            Ok(writer) => writer,
            Err(open_error) => {
                monitor.on_error(MonitorErrorKind::McapFileCreationFailure);
                inner.files.abandon_file();
                return Err(RecorderError::Initialization(format!(
                    "failed to open {} for writing: {open_error}",
                    path.display()
                )));
            }
        };
        inner.mcap = Some(writer);

        let budget = inner.files.file_budget();
        let safety_margin = inner.safety_margin;
        inner.size.init(budget, safety_margin);
        inner.schema_file_ids.clear();
        inner.channel_file_ids.clear();

        // The minimum size accounts for the mandatory records; a failure
        // here means the aggregate cap cannot even fit them. Seal the file
        // so nothing is left dangling under its in-progress name.
        if let Err(replay_error) = Self::replay_into_file(inner) {
            Self::close_current_file(inner);
            return Err(Self::mandatory_write_error(replay_error));
        }

        Self::publish_size(inner);
        Ok(())
    }

    /// Emit the records every fresh file starts with: version metadata, all
    /// known schemas and channels in id order, and the reservation for the
    /// pending dynamic-types attachment.
    fn replay_into_file(inner: &mut WriterInner) -> Result<(), RecorderError> {
        Self::write_version_metadata(inner)?;

        let schema_ids: Vec<u16> = inner.schemas.keys().copied().collect();
        for id in schema_ids {
            Self::emit_schema(inner, id)?;
        }

        let channel_ids: Vec<u16> = inner.channels.keys().copied().collect();
        for id in channel_ids {
            Self::emit_channel(inner, id)?;
        }

        if inner.record_types {
            if let Some(payload) = inner.dynamic_types_payload.as_ref() {
                let len = payload.len() as u64;
                inner.size.attachment_to_write(len, 0)?;
            }
        }

        Ok(())
    }

    fn mandatory_write_error(error: RecorderError) -> RecorderError {
        match error {
            RecorderError::FullFile { data_size } => RecorderError::FullDisk(format!(
                "mandatory records ({data_size} B) exceed the remaining file budget"
            )),
            other => other,
        }
    }

    /// Write the dynamic-types attachment, finalize the container and rename
    /// the file to its final name.
    fn close_current_file(inner: &mut WriterInner) {
        if inner.record_types && inner.dynamic_types_payload.is_some() && inner.mcap.is_some() {
            Self::write_attachment(inner);
        }

        let written = inner.size.written_size();
        inner.files.set_current_file_size(written);

        if let Some(mut mcap) = inner.mcap.take() {
            if let Err(finish_error) = mcap.finish() {
                error!("Error finalizing recording file: {}", finish_error);
            }
        }

        // Publish the real on-disk size before sealing the entry.
        let actual = inner
            .files
            .current_path()
            .and_then(|path| std::fs::metadata(path).ok())
            .map(|metadata| metadata.len());
        if let Some(actual) = actual {
            inner.files.set_current_file_size(actual);
        }

        inner.files.close_file();
    }

    fn write_attachment(inner: &mut WriterInner) {
        let Some(payload) = inner.dynamic_types_payload.as_ref() else {
            return;
        };
        let Some(mcap) = inner.mcap.as_mut() else {
            return;
        };

        let data_len = payload.len() as u64;
        info!("Writing attachment '{}' ({} B)", DYNAMIC_TYPES_ATTACHMENT_NAME, data_len);

        let timestamp = now_nanos();
        let attachment = mcap::Attachment {
            log_time: timestamp,
            create_time: timestamp,
            name: DYNAMIC_TYPES_ATTACHMENT_NAME.to_string(),
            media_type: DYNAMIC_TYPES_MEDIA_TYPE.to_string(),
            data: Cow::Borrowed(payload.as_slice()),
        };

        // The reservation was made when the payload was last updated.
        if let Err(attach_error) = mcap.attach(&attachment) {
            error!("Error writing attachment: {}", attach_error);
            return;
        }

        inner.size.attachment_written(data_len);
    }

    fn write_version_metadata(inner: &mut WriterInner) -> Result<(), RecorderError> {
        let mut map = BTreeMap::new();
        map.insert(
            VERSION_METADATA_RELEASE.to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        map.insert(
            VERSION_METADATA_COMMIT.to_string(),
            env!("DDS_RECORDER_COMMIT_HASH").to_string(),
        );

        inner.size.metadata_to_write(VERSION_METADATA_NAME, &map)?;

        let mcap = inner
            .mcap
            .as_mut()
            .ok_or_else(|| RecorderError::Inconsistency("no open file".to_string()))?;
        mcap.write_metadata(&mcap::records::Metadata {
            name: VERSION_METADATA_NAME.to_string(),
            metadata: map.clone(),
        })?;

        inner.size.metadata_written(VERSION_METADATA_NAME, &map);
        Ok(())
    }

    fn emit_schema(inner: &mut WriterInner, id: u16) -> Result<(), RecorderError> {
        let spec = inner
            .schemas
            .get(&id)
            .cloned()
            .ok_or_else(|| RecorderError::Inconsistency(format!("unknown schema id {id}")))?;

        inner.size.schema_to_write(&spec)?;

        let mcap = inner
            .mcap
            .as_mut()
            .ok_or_else(|| RecorderError::Inconsistency("no open file".to_string()))?;
        let file_id = mcap.add_schema(&spec.name, &spec.encoding, &spec.data)?;

        inner.schema_file_ids.insert(id, file_id);
        inner.size.schema_written(&spec);
        Ok(())
    }

    fn emit_channel(inner: &mut WriterInner, id: u16) -> Result<(), RecorderError> {
        let spec = inner
            .channels
            .get(&id)
            .cloned()
            .ok_or_else(|| RecorderError::Inconsistency(format!("unknown channel id {id}")))?;

        let file_schema_id = inner
            .schema_file_ids
            .get(&spec.schema_id)
            .copied()
            .ok_or_else(|| {
                RecorderError::Inconsistency(format!(
                    "channel '{}' references schema {} absent from the current file",
                    spec.topic, spec.schema_id
                ))
            })?;

        inner.size.channel_to_write(&spec)?;

        let mcap = inner
            .mcap
            .as_mut()
            .ok_or_else(|| RecorderError::Inconsistency("no open file".to_string()))?;
        let file_id = mcap.add_channel(
            file_schema_id,
            &spec.topic,
            &spec.message_encoding,
            &spec.metadata,
        )?;

        inner.channel_file_ids.insert(id, file_id);
        inner.size.channel_written(&spec);
        Ok(())
    }

    fn try_write_message(inner: &mut WriterInner, message: &Message) -> Result<(), RecorderError> {
        let data_len = message.payload.len() as u64;
        inner.size.message_to_write(data_len)?;

        let file_channel_id = inner
            .channel_file_ids
            .get(&message.channel_id)
            .copied()
            .ok_or_else(|| {
                RecorderError::Inconsistency(format!(
                    "channel {} not present in the current file",
                    message.channel_id
                ))
            })?;

        let mcap = inner
            .mcap
            .as_mut()
            .ok_or_else(|| RecorderError::Inconsistency("no open file".to_string()))?;
        mcap.write_to_known_channel(
            &MessageHeader {
                channel_id: file_channel_id,
                sequence: message.sequence,
                log_time: message.log_time_ns,
                publish_time: message.publish_time_ns,
            },
            &message.payload,
        )?;

        inner.size.message_written(data_len);
        Ok(())
    }

    /// Full-file path: close the current file, open a successor large enough
    /// for the mandatory records plus the write that did not fit.
    fn rotate(
        inner: &mut WriterInner,
        monitor: &Arc<dyn RecorderMonitor>,
        unfit_bytes: u64,
    ) -> Result<(), RecorderError> {
        info!("Recording file is full, rotating");

        Self::close_current_file(inner);

        // Keep the writer disabled until the new file is usable, so a
        // concurrent observer never sees a half-open state.
        inner.enabled = false;

        if inner.files.rotation_disabled() {
            return Err(RecorderError::FullDisk(
                "single-file configuration and the file is full".to_string(),
            ));
        }

        let min_file_size = inner.size.min_mcap_size() + unfit_bytes;
        Self::open_new_file(inner, monitor, min_file_size)?;

        inner.enabled = true;
        Ok(())
    }
}

impl Drop for McapWriter {
    fn drop(&mut self) {
        self.disable();
    }
}
