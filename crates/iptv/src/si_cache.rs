use crate::config::SI_SNAPSHOT_SIZE;

/// Snapshot of the first transport packets of a stream, holding the
/// program/stream description tables. Either empty or exactly
/// [`SI_SNAPSHOT_SIZE`] bytes.
#[derive(Debug, Default, Clone)]
pub struct StreamInfoCache {
    snapshot: Option<Box<[u8; SI_SNAPSHOT_SIZE]>>,
}

impl StreamInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none()
    }

    /// Capture the leading packets of `chunk` if nothing is cached yet and
    /// the chunk is long enough. Returns whether a snapshot was taken.
    pub fn capture(&mut self, chunk: &[u8]) -> bool {
        if self.snapshot.is_some() {
            return false;
        }
        let Some(head) = chunk.first_chunk::<SI_SNAPSHOT_SIZE>() else {
            return false;
        };
        self.snapshot = Some(Box::new(*head));
        true
    }

    pub fn snapshot(&self) -> Option<&[u8]> {
        self.snapshot.as_deref().map(|s| s.as_slice())
    }

    pub fn clear(&mut self) {
        self.snapshot = None;
    }
}
