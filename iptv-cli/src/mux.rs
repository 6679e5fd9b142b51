use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use iptv_engine::{
    IptvError, MuxInput, MuxLifecycle, MuxLocks, OutputBuffer, RecvStatus, Timer, TokioTimer,
};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// Lifecycle notifications forwarded to the main task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxEvent {
    Started,
    Failed(String),
}

/// Mux handing aligned transport stream chunks to a writer task through a
/// bounded queue. A full queue asks the input to pause; data held back
/// beyond the output buffer capacity is dropped.
pub struct ChannelMux {
    locks: MuxLocks,
    pause_timer: TokioTimer,
    extra_headers: HeaderMap,
    raw_url: String,
    writer: Mutex<Option<mpsc::Sender<Bytes>>>,
    events: mpsc::UnboundedSender<MuxEvent>,
    forwarded: AtomicU64,
}

impl ChannelMux {
    pub fn new(
        raw_url: String,
        extra_headers: HeaderMap,
        buffer_capacity: usize,
        writer: mpsc::Sender<Bytes>,
        events: mpsc::UnboundedSender<MuxEvent>,
        pause_timer: TokioTimer,
    ) -> Self {
        Self {
            locks: MuxLocks::new(buffer_capacity),
            pause_timer,
            extra_headers,
            raw_url,
            writer: Mutex::new(Some(writer)),
            events,
            forwarded: AtomicU64::new(0),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.locks.lifecycle().active = active;
    }

    /// Bytes handed to the writer so far
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Drop the writer side so the writer task can finish
    pub fn close_writer(&self) {
        self.writer.lock().take();
    }
}

impl MuxInput for ChannelMux {
    fn locks(&self) -> &MuxLocks {
        &self.locks
    }

    fn extra_headers(&self) -> &HeaderMap {
        &self.extra_headers
    }

    fn raw_url(&self) -> Option<&str> {
        Some(&self.raw_url)
    }

    fn pause_timer(&self) -> &dyn Timer {
        &self.pause_timer
    }

    fn mux_started(&self, lifecycle: &mut MuxLifecycle) {
        if lifecycle.active {
            let _ = self.events.send(MuxEvent::Started);
        }
    }

    fn tuning_failed(&self, lifecycle: &mut MuxLifecycle, error: &IptvError) {
        lifecycle.active = false;
        let _ = self.events.send(MuxEvent::Failed(error.to_string()));
    }

    fn recv_packets(&self, output: &mut OutputBuffer, _len: usize) -> RecvStatus {
        let writer = self.writer.lock();
        let Some(writer) = writer.as_ref() else {
            output.take();
            return RecvStatus::Ok;
        };

        match writer.try_reserve() {
            Ok(permit) => {
                let chunk = output.take();
                self.forwarded
                    .fetch_add(chunk.len() as u64, Ordering::Relaxed);
                permit.send(chunk);
                if writer.capacity() == 0 {
                    debug!("Writer queue full");
                    RecvStatus::ShouldPause
                } else {
                    RecvStatus::Ok
                }
            }
            Err(TrySendError::Full(())) if output.remaining() == 0 => {
                let dropped = output.take();
                warn!(
                    dropped = dropped.len(),
                    capacity = output.capacity(),
                    "Writer behind and output buffer full, dropping data"
                );
                RecvStatus::ShouldPause
            }
            // Keep the data buffered until the writer catches up.
            Err(TrySendError::Full(())) => RecvStatus::ShouldPause,
            Err(TrySendError::Closed(())) => {
                info!("Writer gone, discarding stream data");
                output.take();
                RecvStatus::Ok
            }
        }
    }
}
