//! # Builder for HttpInputConfig
//!
//! Fluent construction of [`HttpInputConfig`] instances.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use iptv_engine::HttpInputConfig;
//!
//! let config = HttpInputConfig::builder()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_user_agent("MyTuner/1.0")
//!     .with_header("X-Api-Key", "my-secret-key")
//!     .with_pause_delay(Duration::from_secs(2))
//!     .build();
//!
//! assert_eq!(config.user_agent, "MyTuner/1.0");
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::HttpInputConfig;

/// Builder for creating HttpInputConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct HttpInputConfigBuilder {
    config: HttpInputConfig,
}

impl HttpInputConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HttpInputConfig::default(),
        }
    }

    /// Set how many consecutive playlist responses are tolerated
    pub fn with_header_repeat_limit(mut self, limit: u32) -> Self {
        self.config.header_repeat_limit = limit;
        self
    }

    /// Set the delay before a paused connection is resumed
    pub fn with_pause_delay(mut self, delay: Duration) -> Self {
        self.config.pause_delay = delay;
        self
    }

    /// Set the minimum bandwidth a variant must exceed to be selected
    pub fn with_min_variant_bandwidth(mut self, bandwidth: u64) -> Self {
        self.config.min_variant_bandwidth = bandwidth;
        self
    }

    /// Set the capacity of the mux output buffer
    pub fn with_output_buffer_size(mut self, size: usize) -> Self {
        self.config.output_buffer_size = size;
        self
    }

    /// Set the largest chunk delivered to the body callback
    pub fn with_io_size(mut self, size: usize) -> Self {
        self.config.io_size = size;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the read timeout (maximum time between receiving data chunks)
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a default HTTP header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    /// Replace all default HTTP headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    /// Set whether to use system proxy settings
    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        self.config.use_system_proxy = use_system_proxy;
        self
    }

    /// Build the final HttpInputConfig
    pub fn build(self) -> HttpInputConfig {
        self.config
    }
}

impl Default for HttpInputConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
