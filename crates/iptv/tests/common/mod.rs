#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use iptv_engine::{
    HttpCallbacks, HttpConnection, HttpEngine, HttpInput, HttpInputConfig, HttpVersion, IptvError,
    ManualTick, MuxInput, MuxLifecycle, MuxLocks, OutputBuffer, RecvStatus, ResponseHead, StreamState,
    TS_PACKET_SIZE, Timer, TimerCallback,
};
use parking_lot::{Mutex, MutexGuard};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use url::Url;

pub const TS: &str = "video/mp2t";
pub const HLS: &str = "application/vnd.apple.mpegurl";

/// A request issued on a mock connection.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub keepalive: bool,
    /// `None` for the initial request, the version for reconnects
    pub version: Option<HttpVersion>,
    pub headers: HeaderMap,
}

type CloseHook = Box<dyn FnOnce() + Send>;

/// Connection whose responses are driven by the test.
pub struct MockConnection {
    pub scheme: String,
    callbacks: Arc<dyn HttpCallbacks>,
    requests: Mutex<Vec<RecordedRequest>>,
    keepalive: AtomicBool,
    closed: AtomicBool,
    fail_requests: AtomicBool,
    pauses: AtomicUsize,
    unpauses: AtomicUsize,
    gate: Mutex<()>,
    on_close: Mutex<Option<CloseHook>>,
}

impl MockConnection {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn request_urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.url.clone()).collect()
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn unpauses(&self) -> usize {
        self.unpauses.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Run `hook` at the start of `close`
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_close.lock() = Some(Box::new(hook));
    }

    fn dispatch(&self, f: impl FnOnce(&dyn HttpCallbacks, &dyn HttpConnection)) {
        let _gate = self.gate.lock();
        if self.is_closed() {
            return;
        }
        f(self.callbacks.as_ref(), self);
    }

    pub fn headers(&self, status: u16, content_type: &str) -> ResponseHead {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        let head = ResponseHead::new(StatusCode::from_u16(status).unwrap(), headers);
        self.dispatch(|callbacks, conn| callbacks.on_headers(conn, &head));
        head
    }

    pub fn data(&self, head: &ResponseHead, chunk: &[u8]) {
        self.dispatch(|callbacks, conn| callbacks.on_data(conn, head, chunk));
    }

    pub fn complete(&self, head: &ResponseHead) {
        self.dispatch(|callbacks, conn| callbacks.on_complete(conn, head));
    }

    pub fn failure(&self, error: &IptvError) {
        self.dispatch(|callbacks, conn| callbacks.on_failure(conn, error));
    }

    /// Serve a complete response in one go
    pub fn respond(&self, content_type: &str, body: &[u8]) {
        let head = self.headers(200, content_type);
        self.data(&head, body);
        self.complete(&head);
    }

    fn record(&self, url: &Url, version: Option<HttpVersion>) -> Result<(), IptvError> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(IptvError::Request {
                url: url.to_string(),
                reason: "refused".into(),
            });
        }
        let keepalive = self.keepalive.load(Ordering::SeqCst);
        let mut headers = HeaderMap::new();
        self.callbacks.create_headers(url, keepalive, &mut headers);
        self.requests.lock().push(RecordedRequest {
            url: url.to_string(),
            keepalive,
            version,
            headers,
        });
        Ok(())
    }
}

impl HttpConnection for MockConnection {
    fn simple_request(&self, url: &Url) -> Result<(), IptvError> {
        self.record(url, None)
    }

    fn reconnect(&self, url: &Url, version: HttpVersion) -> Result<(), IptvError> {
        self.record(url, Some(version))
    }

    fn set_keepalive(&self, keepalive: bool) {
        self.keepalive.store(keepalive, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn unpause(&self) {
        self.unpauses.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        let hook = self.on_close.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        self.closed.store(true, Ordering::SeqCst);
        drop(self.gate.lock());
    }

    fn is_tls(&self) -> bool {
        self.scheme == "https"
    }
}

#[derive(Default)]
pub struct MockEngine {
    connections: Mutex<Vec<Arc<MockConnection>>>,
    pub fail_connect: AtomicBool,
    pub fail_requests: AtomicBool,
}

impl MockEngine {
    pub fn last(&self) -> Arc<MockConnection> {
        self.connections
            .lock()
            .last()
            .cloned()
            .expect("no connection opened")
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}

impl HttpEngine for MockEngine {
    fn connect(
        &self,
        scheme: &str,
        host: &str,
        port: u16,
        callbacks: Arc<dyn HttpCallbacks>,
    ) -> Result<Arc<dyn HttpConnection>, IptvError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(IptvError::Connect {
                host: host.to_string(),
                port,
                reason: "unreachable".into(),
            });
        }
        let conn = Arc::new(MockConnection {
            scheme: scheme.to_string(),
            callbacks,
            requests: Mutex::new(Vec::new()),
            keepalive: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            fail_requests: AtomicBool::new(self.fail_requests.load(Ordering::SeqCst)),
            pauses: AtomicUsize::new(0),
            unpauses: AtomicUsize::new(0),
            gate: Mutex::new(()),
            on_close: Mutex::new(None),
        });
        self.connections.lock().push(conn.clone());
        Ok(conn)
    }
}

/// Mux collecting everything it receives.
pub struct MockMux {
    locks: MuxLocks,
    extra_headers: HeaderMap,
    raw_url: Option<String>,
    started: AtomicUsize,
    failures: Mutex<Vec<String>>,
    recv_lens: Mutex<Vec<usize>>,
    received: Mutex<Vec<u8>>,
    taps: AtomicUsize,
    saturated: AtomicBool,
    manual_timer: Arc<ManualTimer>,
    pause_timer: Arc<dyn Timer>,
}

impl MockMux {
    /// Mux whose pause timer only fires through [`MockMux::timer`]
    pub fn new(raw_url: Option<&str>, extra_headers: HeaderMap) -> Arc<Self> {
        let timer = Arc::new(ManualTimer::default());
        Self::build(raw_url, extra_headers, timer.clone(), timer)
    }

    pub fn with_timer(
        raw_url: Option<&str>,
        extra_headers: HeaderMap,
        pause_timer: Arc<dyn Timer>,
    ) -> Arc<Self> {
        Self::build(raw_url, extra_headers, Arc::default(), pause_timer)
    }

    fn build(
        raw_url: Option<&str>,
        extra_headers: HeaderMap,
        manual_timer: Arc<ManualTimer>,
        pause_timer: Arc<dyn Timer>,
    ) -> Arc<Self> {
        let mux = Self {
            locks: MuxLocks::new(64 * 1024),
            extra_headers,
            raw_url: raw_url.map(str::to_owned),
            started: AtomicUsize::new(0),
            failures: Mutex::new(Vec::new()),
            recv_lens: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
            taps: AtomicUsize::new(0),
            saturated: AtomicBool::new(false),
            manual_timer,
            pause_timer,
        };
        mux.locks.lifecycle().active = true;
        Arc::new(mux)
    }

    pub fn stream(&self) -> MutexGuard<'_, StreamState> {
        self.locks.stream()
    }

    pub fn set_active(&self, active: bool) {
        self.locks.lifecycle().active = active;
    }

    pub fn set_saturated(&self, saturated: bool) {
        self.saturated.store(saturated, Ordering::SeqCst);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().clone()
    }

    pub fn received(&self) -> Vec<u8> {
        self.received.lock().clone()
    }

    pub fn recv_lens(&self) -> Vec<usize> {
        self.recv_lens.lock().clone()
    }

    pub fn taps(&self) -> usize {
        self.taps.load(Ordering::SeqCst)
    }

    pub fn timer(&self) -> &ManualTimer {
        &self.manual_timer
    }
}

impl MuxInput for MockMux {
    fn locks(&self) -> &MuxLocks {
        &self.locks
    }

    fn extra_headers(&self) -> &HeaderMap {
        &self.extra_headers
    }

    fn raw_url(&self) -> Option<&str> {
        self.raw_url.as_deref()
    }

    fn pause_timer(&self) -> &dyn Timer {
        self.pause_timer.as_ref()
    }

    fn mux_started(&self, _lifecycle: &mut MuxLifecycle) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn tuning_failed(&self, lifecycle: &mut MuxLifecycle, error: &IptvError) {
        lifecycle.active = false;
        self.failures.lock().push(error.to_string());
    }

    fn recv_packets(&self, output: &mut OutputBuffer, len: usize) -> RecvStatus {
        self.recv_lens.lock().push(len);
        self.received.lock().extend_from_slice(&output.take());
        if self.saturated.load(Ordering::SeqCst) {
            RecvStatus::ShouldPause
        } else {
            RecvStatus::Ok
        }
    }

    fn stream_tap(&self, _chunk: &[u8]) {
        self.taps.fetch_add(1, Ordering::SeqCst);
    }
}

/// Timer whose callbacks only run when the test fires them.
#[derive(Default)]
pub struct ManualTimer {
    armed: Mutex<Vec<(Duration, TimerCallback)>>,
    arm_count: AtomicUsize,
}

impl ManualTimer {
    pub fn arm_count(&self) -> usize {
        self.arm_count.load(Ordering::SeqCst)
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.armed.lock().iter().map(|(delay, _)| *delay).collect()
    }

    pub fn fire_all(&self) {
        let armed = std::mem::take(&mut *self.armed.lock());
        for (_, callback) in armed {
            callback();
        }
    }
}

impl Timer for ManualTimer {
    fn arm(&self, delay: Duration, callback: TimerCallback) {
        self.arm_count.fetch_add(1, Ordering::SeqCst);
        self.armed.lock().push((delay, callback));
    }
}

pub struct Harness {
    pub engine: Arc<MockEngine>,
    pub clock: Arc<ManualTick>,
    pub input: HttpInput,
}

impl Harness {
    pub fn new(config: HttpInputConfig) -> Self {
        let engine = Arc::new(MockEngine::default());
        let clock = Arc::new(ManualTick::new(1));
        let input = HttpInput::new(engine.clone(), config, clock.clone());
        Self {
            engine,
            clock,
            input,
        }
    }
}

/// `count` transport packets, each tagged with its index.
pub fn packets(count: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(count * TS_PACKET_SIZE);
    for idx in 0..count {
        let mut packet = [0u8; TS_PACKET_SIZE];
        packet[0] = 0x47;
        packet[4..8].copy_from_slice(&(idx as u32).to_be_bytes());
        data.extend_from_slice(&packet);
    }
    data
}
