//! # HTTP(S) input
//!
//! Scheme handler for `http` and `https` mux URLs. Starting a mux opens a
//! connection through the configured [`HttpEngine`] and returns the
//! [`HttpSession`] feeding it.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use iptv_engine::{HttpInput, HttpInputConfig, ReqwestEngine, SystemTick};
//!
//! # fn example() -> Result<(), iptv_engine::IptvError> {
//! let runtime = tokio::runtime::Handle::current();
//! let config = HttpInputConfig::builder()
//!     .with_user_agent("my-tuner/1.0")
//!     .build();
//! let engine = ReqwestEngine::new(&config, runtime)?;
//! let input = HttpInput::new(
//!     Arc::new(engine),
//!     config,
//!     Arc::new(SystemTick),
//! );
//! assert!(HttpInput::handles("https"));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use parking_lot::MutexGuard;
use tracing::{error, info};
use url::Url;

use crate::aligner::PacketAligner;
use crate::clock::TickSource;
use crate::config::HttpInputConfig;
use crate::error::IptvError;
use crate::http::HttpEngine;
use crate::mux::{MuxInput, StreamState};
use crate::playlist::{M3u8Parser, PlaylistParser};
use crate::session::{self, CallbackSlot, HttpSession, SessionContext};

pub struct HttpInput {
    engine: Arc<dyn HttpEngine>,
    ctx: SessionContext,
}

impl HttpInput {
    /// URL schemes served by this input
    pub const SCHEMES: [&'static str; 2] = ["http", "https"];

    pub fn new(
        engine: Arc<dyn HttpEngine>,
        config: HttpInputConfig,
        clock: Arc<dyn TickSource>,
    ) -> Self {
        Self {
            engine,
            ctx: SessionContext {
                config: Arc::new(config),
                parser: Arc::new(M3u8Parser),
                clock,
            },
        }
    }

    /// Replace the default `m3u8-rs` backed parser
    pub fn with_parser(mut self, parser: Arc<dyn PlaylistParser>) -> Self {
        self.ctx.parser = parser;
        self
    }

    pub fn handles(scheme: &str) -> bool {
        Self::SCHEMES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(scheme))
    }

    pub fn config(&self) -> &HttpInputConfig {
        &self.ctx.config
    }

    /// Start tuning `mux` from `url`. Must be called with the stream lock
    /// held, `stream` being the guarded state.
    ///
    /// The session is attached to the mux only once the initial request has
    /// been issued; on error nothing is left behind.
    pub fn start(
        &self,
        mux: Arc<dyn MuxInput>,
        url: &Url,
        stream: &mut StreamState,
    ) -> Result<Arc<HttpSession>, IptvError> {
        if !Self::handles(url.scheme()) {
            return Err(IptvError::UnsupportedScheme(url.scheme().to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| IptvError::InvalidUrl(format!("{url}: missing host")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| IptvError::InvalidUrl(format!("{url}: missing port")))?;

        let slot = Arc::new(CallbackSlot::new(self.ctx.config.clone()));
        let conn = self.engine.connect(url.scheme(), host, port, slot.clone())?;
        let session = Arc::new(HttpSession::new(mux, conn, slot, self.ctx.clone()));
        session.slot().attach(session.clone());

        if let Err(e) = session.connection().simple_request(url) {
            error!(url = %url, error = %e, "Initial request failed");
            session.slot().detach();
            session.connection().close();
            return Err(e);
        }

        stream.output.reset(self.ctx.config.output_buffer_size);
        stream.aligner = Some(PacketAligner::new());
        info!(url = %url, "HTTP input started");
        Ok(session)
    }

    /// Stop `session`; see [`session::stop`].
    pub fn stop(&self, session: &HttpSession, stream: &mut MutexGuard<'_, StreamState>) {
        session::stop(session, stream);
    }

    /// Resume reading on a paused session
    pub fn unpause(&self, session: &HttpSession) {
        session.connection().unpause();
    }
}
