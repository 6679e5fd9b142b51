//! # HTTP engine contract
//!
//! A session does not speak HTTP itself. It drives an [`HttpEngine`]
//! connection and is driven back through [`HttpCallbacks`], invoked on the
//! engine's own I/O context, one callback at a time per connection.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{CONNECTION, CONTENT_TYPE, HOST, HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::error::IptvError;

/// Playlist media types, compared case-insensitively against the part of
/// `Content-Type` before any parameters.
pub const PLAYLIST_CONTENT_TYPES: [&str; 5] = [
    "audio/mpegurl",
    "audio/x-mpegurl",
    "application/x-mpegurl",
    "application/apple.vnd.mpegurl",
    "application/vnd.apple.mpegurl",
];

/// Protocol version requested on reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http11,
}

impl From<HttpVersion> for reqwest::Version {
    fn from(version: HttpVersion) -> Self {
        match version {
            HttpVersion::Http11 => reqwest::Version::HTTP_11,
        }
    }
}

/// Status line and headers of the response currently being received.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        Self { status, headers }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn is_playlist(&self) -> bool {
        self.content_type().is_some_and(is_playlist_content_type)
    }
}

/// Whether `content_type` names one of the [`PLAYLIST_CONTENT_TYPES`].
pub fn is_playlist_content_type(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    PLAYLIST_CONTENT_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(essence))
}

/// Callbacks registered with a connection.
pub trait HttpCallbacks: Send + Sync {
    fn on_headers(&self, conn: &dyn HttpConnection, head: &ResponseHead);

    fn on_data(&self, conn: &dyn HttpConnection, head: &ResponseHead, chunk: &[u8]);

    fn on_complete(&self, conn: &dyn HttpConnection, head: &ResponseHead);

    /// The request could not be sent or the body could not be read to the
    /// end. No further callbacks follow for that request.
    fn on_failure(&self, conn: &dyn HttpConnection, error: &IptvError);

    /// Fill in the request headers for `url`.
    fn create_headers(&self, url: &Url, keepalive: bool, headers: &mut HeaderMap);
}

pub trait HttpConnection: Send + Sync {
    /// Issue a GET for `url` on this connection.
    fn simple_request(&self, url: &Url) -> Result<(), IptvError>;

    /// Drop the current response and issue a GET for `url`, possibly on a
    /// different host.
    fn reconnect(&self, url: &Url, version: HttpVersion) -> Result<(), IptvError>;

    fn set_keepalive(&self, keepalive: bool);

    /// Stop reading body data until [`unpause`](Self::unpause).
    fn pause(&self);

    fn unpause(&self);

    /// Close the connection. Blocks until a callback running on another
    /// thread has returned; must not be called from inside a callback.
    fn close(&self);

    fn is_tls(&self) -> bool;
}

pub trait HttpEngine: Send + Sync {
    fn connect(
        &self,
        scheme: &str,
        host: &str,
        port: u16,
        callbacks: Arc<dyn HttpCallbacks>,
    ) -> Result<Arc<dyn HttpConnection>, IptvError>;
}

/// `host[:port]` of `url`, the port only when it is not the scheme default.
pub fn host_authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Headers every request carries before mux specific ones are added.
pub fn basic_headers(url: &Url, keepalive: bool, user_agent: &str, defaults: &HeaderMap) -> HeaderMap {
    let mut headers = defaults.clone();
    if let Some(value) = host_authority(url).and_then(|h| HeaderValue::from_str(&h).ok()) {
        headers.insert(HOST, value);
    }
    if let Ok(value) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, value);
    }
    headers.insert(
        CONNECTION,
        HeaderValue::from_static(if keepalive { "keep-alive" } else { "close" }),
    );
    headers
}

/// Layer `extra` on top of `headers`, replacing existing values.
pub fn merge_headers(headers: &mut HeaderMap, extra: &HeaderMap) {
    for name in extra.keys() {
        headers.remove(name);
    }
    for (name, value) in extra {
        headers.append(name.clone(), value.clone());
    }
}
