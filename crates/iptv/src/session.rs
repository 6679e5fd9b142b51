//! # HTTP session
//!
//! One [`HttpSession`] exists per tuning attempt. It is driven by the HTTP
//! engine callbacks through a [`CallbackSlot`] and moves through
//! playlist responses (accumulated and parsed, then followed) until media
//! arrives, which is forwarded to the mux through the packet aligner.
//!
//! ## Locking
//!
//! Besides the two mux locks, the session keeps its own control state behind
//! a third lock. The control lock is never held while a mux lock is
//! acquired, and the stream lock is always released before the lifecycle
//! lock is taken. Only [`stop`] holds the stream lock while taking the
//! control lock.

use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::{Mutex, MutexGuard};
use reqwest::header::{HOST, HeaderMap};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::clock::TickSource;
use crate::config::HttpInputConfig;
use crate::error::IptvError;
use crate::http::{
    HttpCallbacks, HttpConnection, HttpVersion, ResponseHead, basic_headers, merge_headers,
};
use crate::mux::{MuxInput, RecvStatus, StreamState};
use crate::playlist::{PlaylistDocument, PlaylistParser};
use crate::selector::SelectorState;

/// Session state touched by the callbacks.
#[derive(Debug, Default)]
struct Control {
    /// The current response carries playlist text
    playlist_phase: bool,
    /// Consecutive playlist-typed responses
    header_repeats: u32,
    /// Playlist text received so far, bounded by the output buffer size
    scratch: BytesMut,
    /// The current playlist body outgrew the scratch buffer and is discarded
    overflowed: bool,
    /// Base for relative playlist links, kept across responses
    base_url: Option<String>,
    selector: SelectorState,
    /// Remainder of the media playlist, consumed on the next media completion
    deferred: Option<PlaylistDocument>,
}

impl Control {
    fn clear(&mut self) {
        self.playlist_phase = false;
        self.header_repeats = 0;
        self.scratch = BytesMut::new();
        self.overflowed = false;
        self.base_url = None;
        self.selector.clear();
        self.deferred = None;
    }
}

/// What to do once a response has been fully handled.
#[derive(Debug)]
enum Next {
    Request(String),
    Fail(IptvError),
    Idle,
}

/// Collaborators shared by every session of an input.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub config: Arc<HttpInputConfig>,
    pub parser: Arc<dyn PlaylistParser>,
    pub clock: Arc<dyn TickSource>,
}

pub struct HttpSession {
    mux: Arc<dyn MuxInput>,
    conn: Arc<dyn HttpConnection>,
    slot: Arc<CallbackSlot>,
    ctx: SessionContext,
    control: Mutex<Control>,
}

impl HttpSession {
    pub(crate) fn new(
        mux: Arc<dyn MuxInput>,
        conn: Arc<dyn HttpConnection>,
        slot: Arc<CallbackSlot>,
        ctx: SessionContext,
    ) -> Self {
        Self {
            mux,
            conn,
            slot,
            ctx,
            control: Mutex::new(Control::default()),
        }
    }

    pub fn connection(&self) -> &Arc<dyn HttpConnection> {
        &self.conn
    }

    pub fn mux(&self) -> &Arc<dyn MuxInput> {
        &self.mux
    }

    /// The variant playlist URL chosen so far
    pub fn media_url(&self) -> Option<String> {
        self.control.lock().selector.media_url().map(str::to_owned)
    }

    /// Whether a live media playlist is held for the next refresh decision
    pub fn has_deferred_playlist(&self) -> bool {
        self.control.lock().deferred.is_some()
    }

    /// Whether engine callbacks still reach this session
    pub fn is_attached(&self) -> bool {
        self.slot.is_attached()
    }

    pub(crate) fn slot(&self) -> &Arc<CallbackSlot> {
        &self.slot
    }

    fn handle_headers(&self, head: &ResponseHead) {
        if !head.is_success() {
            trace!(status = %head.status, "Ignoring non-success response headers");
            return;
        }

        {
            let mut control = self.control.lock();
            if head.is_playlist() {
                control.playlist_phase = true;
                control.overflowed = false;
                control.header_repeats += 1;
                if control.header_repeats <= self.ctx.config.header_repeat_limit {
                    trace!(repeats = control.header_repeats, "Playlist response");
                    return;
                }
                warn!(
                    limit = self.ctx.config.header_repeat_limit,
                    "Too many playlist responses in a row, treating as media"
                );
            }
            control.playlist_phase = false;
            control.header_repeats = 0;
            control.overflowed = false;
        }

        if let Some(aligner) = self.mux.locks().stream().aligner.as_mut() {
            aligner.reset_offset();
        }

        let mut lifecycle = self.mux.locks().lifecycle();
        self.mux.mux_started(&mut lifecycle);
    }

    fn handle_data(&self, conn: &dyn HttpConnection, head: &ResponseHead, chunk: &[u8]) {
        if !head.is_success() {
            return;
        }

        {
            let mut control = self.control.lock();
            if control.playlist_phase {
                if control.overflowed {
                    return;
                }
                let limit = self.ctx.config.output_buffer_size;
                if control.scratch.len() + chunk.len() <= limit {
                    control.scratch.extend_from_slice(chunk);
                    return;
                }
                control.overflowed = true;
                control.scratch.clear();
                drop(control);
                error!(limit, "Playlist larger than the input buffer");
                self.fail(&IptvError::PlaylistParse(format!(
                    "playlist exceeds {limit} bytes"
                )));
                return;
            }
        }

        let status = {
            let mut stream = self.mux.locks().stream();
            let StreamState { output, aligner } = &mut *stream;
            let Some(aligner) = aligner.as_mut() else {
                return;
            };
            let outcome = aligner.push(chunk, self.ctx.clock.tick(), output);
            if outcome.injected {
                trace!(offset = aligner.offset(), "Stream info re-injected");
            }
            self.mux.stream_tap(chunk);
            self.mux.recv_packets(output, outcome.appended)
        };

        if status == RecvStatus::ShouldPause {
            self.pause(conn);
        }
    }

    /// Stop reading and schedule the unpause, unless the mux went inactive.
    fn pause(&self, conn: &dyn HttpConnection) {
        conn.pause();

        let lifecycle = self.mux.locks().lifecycle();
        if !lifecycle.active {
            debug!("Mux inactive, not scheduling unpause");
            return;
        }

        let mux = Arc::downgrade(&self.mux);
        let conn = Arc::downgrade(&self.conn);
        self.mux.pause_timer().arm(
            self.ctx.config.pause_delay,
            Box::new(move || {
                let (Some(mux), Some(conn)) = (mux.upgrade(), conn.upgrade()) else {
                    return;
                };
                let lifecycle = mux.locks().lifecycle();
                if lifecycle.active {
                    conn.unpause();
                }
            }),
        );
        trace!(delay = ?self.ctx.config.pause_delay, "Input paused");
    }

    fn handle_complete(&self, conn: &dyn HttpConnection, head: &ResponseHead) {
        if !head.is_success() {
            warn!(status = %head.status, "Request completed without success");
            self.fail(&IptvError::Status(head.status));
            return;
        }

        let next = {
            let mut control = self.control.lock();
            if control.playlist_phase {
                control.playlist_phase = false;
                if control.overflowed {
                    control.overflowed = false;
                    Next::Idle
                } else {
                    self.complete_playlist(&mut control, conn, head)
                }
            } else {
                self.complete_media(&mut control)
            }
        };

        match next {
            Next::Request(url) => self.follow(conn, &url),
            Next::Fail(error) => self.fail(&error),
            Next::Idle => {}
        }
    }

    fn complete_playlist(
        &self,
        control: &mut Control,
        conn: &dyn HttpConnection,
        head: &ResponseHead,
    ) -> Next {
        let text = control.scratch.split().freeze();

        match self.base_url(conn, head) {
            Ok(Some(base_url)) => control.base_url = Some(base_url),
            Ok(None) => {}
            Err(raw_url) => {
                error!(url = raw_url, "Cannot derive playlist base URL");
                return Next::Idle;
            }
        }

        let Some(document) = self.ctx.parser.parse(&text, control.base_url.as_deref()) else {
            error!(len = text.len(), "Playlist contents parsing failed");
            return Next::Fail(IptvError::PlaylistParse(format!(
                "{} bytes of unparsable playlist text",
                text.len()
            )));
        };
        self.select_next(control, document)
    }

    fn complete_media(&self, control: &mut Control) -> Next {
        let Some(media_url) = control.selector.media_url().map(str::to_owned) else {
            return Next::Idle;
        };
        let Some(document) = control.deferred.take() else {
            return Next::Idle;
        };

        if !document.is_empty() {
            return self.select_next(control, document);
        }

        control.selector.leave_second_level();
        if document.end_list {
            info!(url = %media_url, "Playlist ended");
            Next::Idle
        } else {
            trace!(url = %media_url, "Refreshing live playlist");
            Next::Request(media_url)
        }
    }

    fn select_next(&self, control: &mut Control, document: PlaylistDocument) -> Next {
        let (url, remaining) = control
            .selector
            .select(document, self.ctx.config.min_variant_bandwidth);
        let Some(url) = url else {
            error!("No playable entry in playlist");
            return Next::Fail(IptvError::NoPlaylistSelection(
                control.selector.media_url().unwrap_or("playlist").to_owned(),
            ));
        };
        if control.selector.second_level() {
            control.deferred = Some(remaining);
        }
        trace!(url = %url, "Playlist URL selected");
        Next::Request(url)
    }

    /// Base URL for the playlist just received. `Ok(None)` keeps the previous
    /// one; `Err` carries a raw URL that could not be used.
    fn base_url<'a>(
        &'a self,
        conn: &dyn HttpConnection,
        head: &ResponseHead,
    ) -> Result<Option<String>, &'a str> {
        if let Some(host) = head.header(HOST.as_str()) {
            let scheme = if conn.is_tls() { "https" } else { "http" };
            return Ok(Some(format!("{scheme}://{host}")));
        }
        let Some(raw_url) = self.mux.raw_url() else {
            return Ok(None);
        };
        match Url::parse(raw_url).map(|u| u.origin()) {
            Ok(origin) if origin.is_tuple() => Ok(Some(origin.ascii_serialization())),
            _ => Err(raw_url),
        }
    }

    fn follow(&self, conn: &dyn HttpConnection, url: &str) {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(e) => {
                error!(url, error = %e, "Playlist URL invalid");
                return;
            }
        };
        conn.set_keepalive(false);
        if let Err(e) = conn.reconnect(&url, HttpVersion::Http11) {
            error!(url = %url, error = %e, "Cannot reopen HTTP client");
            self.fail(&e);
        }
    }

    fn fail(&self, error: &IptvError) {
        if !self.slot.is_attached() {
            debug!(error = %error, "Session detached, dropping failure");
            return;
        }
        let mut lifecycle = self.mux.locks().lifecycle();
        self.mux.tuning_failed(&mut lifecycle, error);
    }

    fn create_headers(&self, url: &Url, keepalive: bool, headers: &mut HeaderMap) {
        let config = &self.ctx.config;
        merge_headers(
            headers,
            &basic_headers(url, keepalive, &config.user_agent, &config.headers),
        );
        merge_headers(headers, self.mux.extra_headers());
    }
}

/// The object registered with the HTTP engine. Callbacks are forwarded to
/// the attached session and dropped once it is detached.
pub struct CallbackSlot {
    session: Mutex<Option<Arc<HttpSession>>>,
    config: Arc<HttpInputConfig>,
}

impl CallbackSlot {
    pub(crate) fn new(config: Arc<HttpInputConfig>) -> Self {
        Self {
            session: Mutex::new(None),
            config,
        }
    }

    pub(crate) fn attach(&self, session: Arc<HttpSession>) {
        *self.session.lock() = Some(session);
    }

    /// Detach the session. Callbacks already running keep their reference.
    pub(crate) fn detach(&self) -> Option<Arc<HttpSession>> {
        self.session.lock().take()
    }

    pub fn is_attached(&self) -> bool {
        self.session.lock().is_some()
    }

    fn current(&self) -> Option<Arc<HttpSession>> {
        self.session.lock().clone()
    }
}

impl HttpCallbacks for CallbackSlot {
    fn on_headers(&self, _conn: &dyn HttpConnection, head: &ResponseHead) {
        if let Some(session) = self.current() {
            session.handle_headers(head);
        }
    }

    fn on_data(&self, conn: &dyn HttpConnection, head: &ResponseHead, chunk: &[u8]) {
        if let Some(session) = self.current() {
            session.handle_data(conn, head, chunk);
        }
    }

    fn on_complete(&self, conn: &dyn HttpConnection, head: &ResponseHead) {
        if let Some(session) = self.current() {
            session.handle_complete(conn, head);
        }
    }

    fn on_failure(&self, _conn: &dyn HttpConnection, error: &IptvError) {
        if let Some(session) = self.current() {
            session.fail(error);
        }
    }

    fn create_headers(&self, url: &Url, keepalive: bool, headers: &mut HeaderMap) {
        match self.current() {
            Some(session) => session.create_headers(url, keepalive, headers),
            None => merge_headers(
                headers,
                &basic_headers(url, keepalive, &self.config.user_agent, &self.config.headers),
            ),
        }
    }
}

/// Stop a session. Must be called with the stream lock held and without the
/// lifecycle lock.
///
/// The session is detached from the callback slot first, so callbacks that
/// start from now on see nothing. The stream lock is then released while the
/// connection is closed, since closing waits for a callback in flight which
/// may itself be waiting for the stream lock. With the lock re-acquired the
/// remaining session state is released.
pub fn stop(session: &HttpSession, stream: &mut MutexGuard<'_, StreamState>) {
    session.slot.detach();

    MutexGuard::unlocked(stream, || session.conn.close());

    stream.aligner = None;
    session.control.lock().clear();
    info!("HTTP input stopped");
}
