//! # IPTV engine
//!
//! HTTP(S) live input for an IPTV tuner. The input fetches an MPEG transport
//! stream over HTTP and transparently follows HLS playlists when the server
//! answers with one instead of media.
//!
//! ## Features
//!
//! - Playlist negotiation: master playlists are resolved to the largest
//!   variant, media playlists are walked entry by entry and refreshed while
//!   they are live
//! - Transport packet realignment with periodic stream-info re-injection
//! - Backpressure: a saturated mux pauses the connection until a timer
//!   resumes it
//! - A `reqwest` based HTTP engine, replaceable through [`HttpEngine`]

pub mod aligner;
pub mod builder;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod input;
pub mod mux;
pub mod playlist;
pub mod selector;
pub mod session;
pub mod si_cache;
pub mod test_utils;
pub mod timer;

pub use aligner::{AlignOutcome, PacketAligner};
pub use builder::HttpInputConfigBuilder;
pub use clock::{ManualTick, SystemTick, TickSource};
pub use config::{HttpInputConfig, SI_SNAPSHOT_SIZE, TS_PACKET_SIZE};
pub use error::IptvError;
pub use http::{HttpCallbacks, HttpConnection, HttpEngine, HttpVersion, ResponseHead};
pub use input::HttpInput;
pub use mux::{MuxInput, MuxLifecycle, MuxLocks, OutputBuffer, RecvStatus, StreamState};
pub use playlist::{
    M3u8Parser, PlaylistDocument, PlaylistItem, PlaylistParser, Resolution, VariantDescriptor,
};
pub use selector::SelectorState;
pub use session::{CallbackSlot, HttpSession};
pub use timer::{Timer, TimerCallback, TokioTimer};

// Re-export engine utilities
pub use engine::{ReqwestEngine, create_client};
