//! # Mux collaborator
//!
//! The tuner-side object a session feeds. Its state is split into two lock
//! domains:
//!
//! - the *lifecycle* lock ([`MuxLifecycle`]): active flag, start/failure
//!   notifications, pause-timer decisions;
//! - the *stream* lock ([`StreamState`]): output buffer, byte offset and
//!   stream-info cache.
//!
//! A call path never takes the lifecycle lock while it holds the stream lock.

use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, MutexGuard};
use reqwest::header::HeaderMap;

use crate::aligner::PacketAligner;
use crate::error::IptvError;
use crate::timer::Timer;

/// Lifecycle state guarded by the lifecycle lock.
#[derive(Debug, Default)]
pub struct MuxLifecycle {
    pub active: bool,
}

/// Byte buffer handed to the mux.
///
/// The capacity is a soft limit: `append` never drops stream bytes, a mux
/// that holds data back checks [`OutputBuffer::remaining`] and decides what
/// to discard.
#[derive(Debug)]
pub struct OutputBuffer {
    data: BytesMut,
    capacity: usize,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes left before the nominal capacity is reached
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.data.len())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Drain everything buffered so far
    pub fn take(&mut self) -> Bytes {
        self.data.split().freeze()
    }

    /// Drop buffered data and re-establish the capacity
    pub fn reset(&mut self, capacity: usize) {
        self.data = BytesMut::with_capacity(capacity);
        self.capacity = capacity;
    }
}

/// State guarded by the stream lock.
#[derive(Debug)]
pub struct StreamState {
    pub output: OutputBuffer,
    pub(crate) aligner: Option<PacketAligner>,
}

impl StreamState {
    pub fn new(capacity: usize) -> Self {
        Self {
            output: OutputBuffer::new(capacity),
            aligner: None,
        }
    }

    /// Whether a session is currently feeding this stream
    pub fn has_session(&self) -> bool {
        self.aligner.is_some()
    }

    /// Number of stream bytes received since the last media response began
    pub fn stream_offset(&self) -> Option<u64> {
        self.aligner.as_ref().map(PacketAligner::offset)
    }
}

/// The two locks of a mux.
#[derive(Debug)]
pub struct MuxLocks {
    lifecycle: Mutex<MuxLifecycle>,
    stream: Mutex<StreamState>,
}

impl MuxLocks {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            lifecycle: Mutex::new(MuxLifecycle::default()),
            stream: Mutex::new(StreamState::new(buffer_capacity)),
        }
    }

    pub fn lifecycle(&self) -> MutexGuard<'_, MuxLifecycle> {
        self.lifecycle.lock()
    }

    pub fn stream(&self) -> MutexGuard<'_, StreamState> {
        self.stream.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStatus {
    Ok,
    /// The consumer is saturated and the input should stop reading for a while
    ShouldPause,
}

/// The mux being tuned.
pub trait MuxInput: Send + Sync + 'static {
    fn locks(&self) -> &MuxLocks;

    /// Extra request headers configured for this mux
    fn extra_headers(&self) -> &HeaderMap;

    /// The URL the tuning attempt was started with
    fn raw_url(&self) -> Option<&str>;

    /// Timer owned by this mux, used to resume a paused input. Arming it
    /// replaces only this mux's pending unpause.
    fn pause_timer(&self) -> &dyn Timer;

    /// Called with the lifecycle lock held once real media starts flowing.
    fn mux_started(&self, lifecycle: &mut MuxLifecycle);

    /// Called with the lifecycle lock held when the tuning attempt cannot
    /// proceed.
    fn tuning_failed(&self, lifecycle: &mut MuxLifecycle, error: &IptvError);

    /// Called with the stream lock held after `len` new bytes were appended
    /// to `output`.
    fn recv_packets(&self, output: &mut OutputBuffer, len: usize) -> RecvStatus;

    /// Diagnostic copy of every received media chunk
    fn stream_tap(&self, _chunk: &[u8]) {}
}
