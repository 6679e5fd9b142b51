//! # Reqwest engine
//!
//! [`HttpEngine`] implementation on top of `reqwest` and `tokio`. Every
//! request runs on its own task which streams the body and dispatches the
//! callbacks. Dispatch goes through a per-connection gate, so at most one
//! callback runs at a time and [`HttpConnection::close`] can wait for the one
//! in flight.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use reqwest::header::HeaderMap;
use rustls::ClientConfig;
use rustls::crypto::aws_lc_rs;
use rustls_platform_verifier::BuilderVerifierExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::HttpInputConfig;
use crate::error::IptvError;
use crate::http::{HttpCallbacks, HttpConnection, HttpEngine, HttpVersion, ResponseHead};

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &HttpInputConfig) -> Result<Client, IptvError> {
    let provider = Arc::new(aws_lc_rs::default_provider());

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| IptvError::Config(format!("TLS protocol versions: {e}")))?
        .with_platform_verifier()
        .map_err(|e| IptvError::Config(format!("TLS verifier: {e}")))?
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if config.use_system_proxy {
        debug!("Using system proxy settings");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled");
    }

    client_builder.build().map_err(IptvError::from)
}

pub struct ReqwestEngine {
    client: Client,
    runtime: Handle,
    io_size: usize,
    read_timeout: Duration,
}

impl ReqwestEngine {
    /// Build an engine whose request tasks are spawned on `runtime`.
    pub fn new(config: &HttpInputConfig, runtime: Handle) -> Result<Self, IptvError> {
        if config.io_size == 0 {
            return Err(IptvError::Config("io_size must be greater than zero".into()));
        }
        Ok(Self {
            client: create_client(config)?,
            runtime,
            io_size: config.io_size,
            read_timeout: config.read_timeout,
        })
    }
}

impl HttpEngine for ReqwestEngine {
    fn connect(
        &self,
        scheme: &str,
        host: &str,
        port: u16,
        callbacks: Arc<dyn HttpCallbacks>,
    ) -> Result<Arc<dyn HttpConnection>, IptvError> {
        if !matches!(scheme, "http" | "https") {
            return Err(IptvError::UnsupportedScheme(scheme.to_string()));
        }
        if host.is_empty() {
            return Err(IptvError::Connect {
                host: host.to_string(),
                port,
                reason: "empty host".into(),
            });
        }
        info!(scheme, host, port, "Opening HTTP connection");

        let (paused, _) = watch::channel(false);
        let conn = Arc::new_cyclic(|this| ReqwestConnection {
            this: this.clone(),
            client: self.client.clone(),
            runtime: self.runtime.clone(),
            tls: scheme == "https",
            io_size: self.io_size,
            read_timeout: self.read_timeout,
            callbacks,
            keepalive: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            paused,
            task: Mutex::new(None),
            gate: Mutex::new(()),
        });
        Ok(conn)
    }
}

pub struct ReqwestConnection {
    this: Weak<ReqwestConnection>,
    client: Client,
    runtime: Handle,
    tls: bool,
    io_size: usize,
    read_timeout: Duration,
    callbacks: Arc<dyn HttpCallbacks>,
    keepalive: AtomicBool,
    closed: AtomicBool,
    /// Bumped for every request; a task only dispatches for its own request
    generation: AtomicU64,
    paused: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    gate: Mutex<()>,
}

impl ReqwestConnection {
    fn start_request(&self, url: &Url, version: HttpVersion) -> Result<(), IptvError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IptvError::Request {
                url: url.to_string(),
                reason: "connection closed".into(),
            });
        }
        if !matches!(url.scheme(), "http" | "https") {
            return Err(IptvError::UnsupportedScheme(url.scheme().to_string()));
        }

        let mut headers = HeaderMap::new();
        self.callbacks
            .create_headers(url, self.keepalive.load(Ordering::Acquire), &mut headers);
        let request = self
            .client
            .get(url.clone())
            .version(version.into())
            .headers(headers);

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(url = %url, generation, "Spawning request task");
        let task = self.runtime.spawn(run_request(RequestTask {
            conn: self.this.clone(),
            generation,
            url: url.clone(),
            io_size: self.io_size,
            read_timeout: self.read_timeout,
            paused: self.paused.subscribe(),
        }, request));

        if let Some(previous) = self.task.lock().replace(task) {
            abort_unless_current(previous);
        }
        Ok(())
    }

    /// Run `f` under the gate if `generation` is still the live request.
    fn dispatch(
        &self,
        generation: u64,
        f: impl FnOnce(&dyn HttpCallbacks, &dyn HttpConnection),
    ) -> bool {
        let _gate = self.gate.lock();
        if self.closed.load(Ordering::Acquire)
            || self.generation.load(Ordering::Acquire) != generation
        {
            return false;
        }
        f(self.callbacks.as_ref(), self);
        true
    }
}

impl HttpConnection for ReqwestConnection {
    fn simple_request(&self, url: &Url) -> Result<(), IptvError> {
        self.start_request(url, HttpVersion::Http11)
    }

    fn reconnect(&self, url: &Url, version: HttpVersion) -> Result<(), IptvError> {
        debug!(url = %url, "Reconnecting");
        self.start_request(url, version)
    }

    fn set_keepalive(&self, keepalive: bool) {
        self.keepalive.store(keepalive, Ordering::Release);
    }

    fn pause(&self) {
        self.paused.send_replace(true);
    }

    fn unpause(&self) {
        self.paused.send_replace(false);
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.task.lock().take() {
            abort_unless_current(task);
        }
        // Wait for a callback still running on the request task.
        drop(self.gate.lock());
        debug!("HTTP connection closed");
    }

    fn is_tls(&self) -> bool {
        self.tls
    }
}

impl Drop for ReqwestConnection {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            abort_unless_current(task);
        }
    }
}

fn abort_unless_current(task: JoinHandle<()>) {
    if tokio::task::try_id() != Some(task.id()) {
        task.abort();
    }
}

struct RequestTask {
    conn: Weak<ReqwestConnection>,
    generation: u64,
    url: Url,
    io_size: usize,
    read_timeout: Duration,
    paused: watch::Receiver<bool>,
}

impl RequestTask {
    fn dispatch(&self, f: impl FnOnce(&dyn HttpCallbacks, &dyn HttpConnection)) -> bool {
        match self.conn.upgrade() {
            Some(conn) => conn.dispatch(self.generation, f),
            None => false,
        }
    }

    fn fail(&self, reason: impl Into<String>) {
        let error = IptvError::Request {
            url: self.url.to_string(),
            reason: reason.into(),
        };
        warn!(url = %self.url, error = %error, "HTTP request failed");
        self.dispatch(|callbacks, conn| callbacks.on_failure(conn, &error));
    }
}

async fn run_request(mut task: RequestTask, request: reqwest::RequestBuilder) {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            task.fail(e.to_string());
            return;
        }
    };

    let head = ResponseHead::new(response.status(), response.headers().clone());
    debug!(url = %task.url, status = %head.status, "Response headers received");
    if !task.dispatch(|callbacks, conn| callbacks.on_headers(conn, &head)) {
        return;
    }

    let mut body = response.bytes_stream();
    loop {
        let next = if task.read_timeout.is_zero() {
            body.next().await
        } else {
            match tokio::time::timeout(task.read_timeout, body.next()).await {
                Ok(next) => next,
                Err(_) => {
                    task.fail(format!("no data for {:?}", task.read_timeout));
                    return;
                }
            }
        };
        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                task.fail(e.to_string());
                return;
            }
            None => break,
        };

        for piece in chunk.chunks(task.io_size) {
            if task.paused.wait_for(|paused| !*paused).await.is_err() {
                return;
            }
            if !task.dispatch(|callbacks, conn| callbacks.on_data(conn, &head, piece)) {
                return;
            }
        }
    }

    trace!(url = %task.url, "Response body complete");
    task.dispatch(|callbacks, conn| callbacks.on_complete(conn, &head));
}
