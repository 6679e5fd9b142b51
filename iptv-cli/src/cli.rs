use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    author = "hua0512 <https://github.com/hua0512>",
    version,
    about = "IPTV HTTP(S) stream tuner",
    long_about = "Tunes a single HTTP(S) IPTV source and writes the MPEG transport stream\n\
                  to a file or to stdout.\n\
                  \n\
                  HLS playlists are followed automatically: the largest variant is chosen\n\
                  and live media playlists are refreshed until the stream ends or the tool\n\
                  is interrupted with Ctrl-C."
)]
pub struct CliArgs {
    /// Source URL
    #[arg(required = true, help = "HTTP(S) URL of the transport stream or HLS playlist")]
    pub url: String,

    /// Output file, stdout if omitted
    #[arg(
        short,
        long,
        help = "File the transport stream is written to (default: stdout)"
    )]
    pub output: Option<PathBuf>,

    /// Custom HTTP headers for every request
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// Custom user agent
    #[arg(long, help = "User-Agent sent with every request")]
    pub user_agent: Option<String>,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Read timeout in seconds
    #[arg(
        long,
        default_value = "30",
        help = "Read timeout in seconds (maximum time between receiving data chunks)"
    )]
    pub read_timeout: u64,

    /// Minimum variant bandwidth
    #[arg(
        long,
        default_value = "200000",
        help = "HLS variants at or below this bandwidth (bits/sec) are never selected"
    )]
    pub min_bandwidth: u64,

    /// Writer queue depth
    #[arg(
        short = 'q',
        long,
        default_value = "64",
        help = "Number of buffered chunks before the input is paused"
    )]
    pub queue_size: usize,

    /// Use system proxy settings
    #[arg(
        long,
        default_value = "true",
        help = "Use system proxy settings for requests"
    )]
    pub use_system_proxy: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,
}
