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

// Payload pool contract shared with the subscription layer

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared handle to payload bytes owned by a [`PayloadPool`].
///
/// Cloning retains the payload; dropping the last clone releases it. The
/// pool's contract guarantees the bytes outlive every handle, so the handler
/// can buffer messages without copying payload data.
#[derive(Debug, Clone)]
pub struct Payload {
    bytes: Arc<[u8]>,
}

impl Payload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Source of payload handles.
///
/// The subscription layer owns one pool per participant; the handler only
/// ever sees [`Payload`] handles acquired from it.
pub trait PayloadPool: Send + Sync {
    /// Copy `bytes` into pool-owned storage and return a shared handle.
    fn acquire(&self, bytes: &[u8]) -> Payload;
}

/// Heap-backed payload pool with running statistics.
#[derive(Default)]
pub struct HeapPayloadPool {
    total_payloads: AtomicUsize,
    total_bytes: AtomicUsize,
}

impl HeapPayloadPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get statistics: (payloads acquired, bytes acquired)
    pub fn stats(&self) -> (usize, usize) {
        (
            self.total_payloads.load(Ordering::Relaxed),
            self.total_bytes.load(Ordering::Relaxed),
        )
    }
}

impl PayloadPool for HeapPayloadPool {
    fn acquire(&self, bytes: &[u8]) -> Payload {
        self.total_payloads.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes.len(), Ordering::Relaxed);

        Payload {
            bytes: Arc::from(bytes),
        }
    }
}
