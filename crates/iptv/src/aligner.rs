//! # Packet aligner
//!
//! Forwards body bytes to the mux output buffer while keeping track of the
//! running stream offset. Once per clock tick the cached stream-info
//! snapshot is re-inserted, always at a transport packet boundary, so that a
//! consumer joining mid-stream sees the program tables again.

use crate::config::TS_PACKET_SIZE;
use crate::mux::OutputBuffer;
use crate::si_cache::StreamInfoCache;

/// What a single [`PacketAligner::push`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignOutcome {
    /// Bytes appended to the output, chunk and snapshot included
    pub appended: usize,
    /// Whether the snapshot was inserted
    pub injected: bool,
}

#[derive(Debug, Default)]
pub struct PacketAligner {
    offset: u64,
    cache: StreamInfoCache,
    last_injection: Option<u64>,
}

impl PacketAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream bytes forwarded since the last offset reset, snapshots excluded
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn reset_offset(&mut self) {
        self.offset = 0;
    }

    pub fn cache(&self) -> &StreamInfoCache {
        &self.cache
    }

    /// Forward `chunk` into `out`, injecting the snapshot when `tick` differs
    /// from the tick of the previous injection.
    pub fn push(&mut self, chunk: &[u8], tick: u64, out: &mut OutputBuffer) -> AlignOutcome {
        self.cache.capture(chunk);

        let mut rest = chunk;
        let mut appended = 0;
        let mut injected = false;

        if self.last_injection != Some(tick) {
            if let Some(snapshot) = self.cache.snapshot() {
                let rem = TS_PACKET_SIZE - (self.offset % TS_PACKET_SIZE as u64) as usize;
                // Not enough bytes to reach the next boundary; retry on the next chunk.
                if rem == TS_PACKET_SIZE || rest.len() >= rem {
                    if rem < TS_PACKET_SIZE {
                        let (head, tail) = rest.split_at(rem);
                        out.append(head);
                        self.offset += rem as u64;
                        appended += rem;
                        rest = tail;
                    }
                    out.append(snapshot);
                    appended += snapshot.len();
                    self.last_injection = Some(tick);
                    injected = true;
                }
            }
        }

        out.append(rest);
        self.offset += rest.len() as u64;
        appended += rest.len();

        AlignOutcome { appended, injected }
    }
}
