use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// One-shot timer facility. Arming again replaces the pending callback.
pub trait Timer: Send + Sync {
    fn arm(&self, delay: Duration, callback: TimerCallback);
}

/// Timer backed by a tokio runtime.
pub struct TokioTimer {
    runtime: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl TokioTimer {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            pending: Mutex::new(None),
        }
    }

    /// Cancel the pending callback, if any
    pub fn disarm(&self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
    }
}

impl Timer for TokioTimer {
    fn arm(&self, delay: Duration, callback: TimerCallback) {
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        if let Some(previous) = self.pending.lock().replace(task) {
            trace!("Re-arming timer, dropping previous callback");
            previous.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
