//! Coarse clock ticks used to pace stream-info re-injection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of coarse clock ticks. Consecutive calls return the same value
/// until the clock advances.
pub trait TickSource: Send + Sync {
    fn tick(&self) -> u64;
}

/// Wall-clock seconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTick;

impl TickSource for SystemTick {
    fn tick(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// A tick source advanced by hand.
#[derive(Debug, Default)]
pub struct ManualTick(AtomicU64);

impl ManualTick {
    pub fn new(start: u64) -> Self {
        Self(AtomicU64::new(start))
    }

    pub fn set(&self, tick: u64) {
        self.0.store(tick, Ordering::Release);
    }

    /// Advance by one tick and return the new value
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl TickSource for ManualTick {
    fn tick(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}
