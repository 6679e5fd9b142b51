use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

/// Size of one MPEG transport stream packet.
pub const TS_PACKET_SIZE: usize = 188;

/// Number of packets captured for the stream-info snapshot.
pub const SI_SNAPSHOT_PACKETS: usize = 2;

/// Size of the stream-info snapshot re-injected into the stream.
pub const SI_SNAPSHOT_SIZE: usize = SI_SNAPSHOT_PACKETS * TS_PACKET_SIZE;

const DEFAULT_USER_AGENT: &str = concat!("iptv-engine/", env!("CARGO_PKG_VERSION"));

/// Configurable options for the HTTP(S) input
#[derive(Debug, Clone)]
pub struct HttpInputConfig {
    /// Consecutive playlist-typed responses tolerated before the next one is
    /// treated as media
    pub header_repeat_limit: u32,

    /// Delay before a paused connection is resumed
    pub pause_delay: Duration,

    /// Variants at or below this bandwidth (bits/sec) are never selected
    pub min_variant_bandwidth: u64,

    /// Capacity of the mux output buffer
    pub output_buffer_size: usize,

    /// Largest chunk handed to the body callback at once
    pub io_size: usize,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Read timeout (maximum time between receiving data chunks)
    pub read_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Default HTTP headers for every request
    pub headers: HeaderMap,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for HttpInputConfig {
    fn default() -> Self {
        Self {
            header_repeat_limit: 10,
            pause_delay: Duration::from_secs(1),
            min_variant_bandwidth: 200_000,
            output_buffer_size: 2 * 1024 * 1024,
            io_size: 128 * 1024,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: HttpInputConfig::get_default_headers(),
            use_system_proxy: true,
        }
    }
}

impl HttpInputConfig {
    pub fn builder() -> crate::builder::HttpInputConfigBuilder {
        crate::builder::HttpInputConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        default_headers
    }
}
