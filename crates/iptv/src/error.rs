// Custom error type for IPTV input operations
#[derive(Debug, thiserror::Error)]
pub enum IptvError {
    #[error("Cannot connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Request for {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Playlist parse error: {0}")]
    PlaylistParse(String),

    #[error("No playable entry found in playlist: {0}")]
    NoPlaylistSelection(String),

    #[error("Unexpected HTTP status: {0}")]
    Status(reqwest::StatusCode),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

