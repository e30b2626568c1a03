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

// Monitoring hook for recorder error conditions

use std::collections::HashMap;
use std::sync::Mutex;

/// Error tags reported to the monitoring hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorErrorKind {
    /// A type was re-announced with a different schema, or a topic name
    /// reappeared carrying a different type.
    TypeMismatch,
    /// A topic reappeared with the same name and type but different QoS.
    QosMismatch,
    /// An output file could not be created.
    McapFileCreationFailure,
    /// No space left for a new file (free disk or aggregate cap).
    DiskFull,
}

impl MonitorErrorKind {
    pub fn as_tag(&self) -> &'static str {
        match self {
            MonitorErrorKind::TypeMismatch => "TYPE_MISMATCH",
            MonitorErrorKind::QosMismatch => "QOS_MISMATCH",
            MonitorErrorKind::McapFileCreationFailure => "MCAP_FILE_CREATION_FAILURE",
            MonitorErrorKind::DiskFull => "DISK_FULL",
        }
    }
}

/// Receives error notifications from the recording core.
///
/// Implementations must not call back into the handler or writer: the hook
/// may be invoked while internal locks are held.
pub trait RecorderMonitor: Send + Sync {
    fn on_error(&self, kind: MonitorErrorKind);
}

/// Monitor that discards all notifications.
pub struct NoopMonitor;

impl RecorderMonitor for NoopMonitor {
    fn on_error(&self, _kind: MonitorErrorKind) {}
}

/// Monitor that counts notifications per tag.
#[derive(Default)]
pub struct CountingMonitor {
    counts: Mutex<HashMap<MonitorErrorKind, usize>>,
}

impl CountingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: MonitorErrorKind) -> usize {
        let counts = match self.counts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        counts.get(&kind).copied().unwrap_or(0)
    }
}

impl RecorderMonitor for CountingMonitor {
    fn on_error(&self, kind: MonitorErrorKind) {
        let mut counts = match self.counts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *counts.entry(kind).or_insert(0) += 1;
    }
}
