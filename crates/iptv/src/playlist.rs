// Playlist documents: the parsed form of an M3U/HLS playlist response.

use std::fmt;

use m3u8_rs::{MasterPlaylist, MediaPlaylist, Playlist, parse_playlist_res};
use tracing::{debug, trace};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    pub width: u64,
    pub height: u64,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An alternate-quality stream advertised by a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDescriptor {
    /// Bits per second
    pub bandwidth: u64,
    pub resolution: Option<Resolution>,
    pub codecs: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistItem {
    Variant(VariantDescriptor),
    /// A reference to playable media without quality metadata
    Direct { url: String },
}

impl PlaylistItem {
    pub fn direct(url: impl Into<String>) -> Self {
        PlaylistItem::Direct { url: url.into() }
    }

    pub fn url(&self) -> &str {
        match self {
            PlaylistItem::Variant(variant) => &variant.url,
            PlaylistItem::Direct { url } => url,
        }
    }

    pub fn into_url(self) -> String {
        match self {
            PlaylistItem::Variant(variant) => variant.url,
            PlaylistItem::Direct { url } => url,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistDocument {
    pub items: Vec<PlaylistItem>,
    /// No further live refresh should happen
    pub end_list: bool,
}

impl PlaylistDocument {
    pub fn new(items: Vec<PlaylistItem>) -> Self {
        Self {
            items,
            end_list: false,
        }
    }

    pub fn with_end_list(mut self, end_list: bool) -> Self {
        self.end_list = end_list;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Turns raw playlist text into a [`PlaylistDocument`].
pub trait PlaylistParser: Send + Sync {
    /// Returns `None` for malformed input. Relative links are resolved
    /// against `base_url` when one is given.
    fn parse(&self, text: &[u8], base_url: Option<&str>) -> Option<PlaylistDocument>;
}

/// [`PlaylistParser`] backed by `m3u8-rs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct M3u8Parser;

impl PlaylistParser for M3u8Parser {
    fn parse(&self, text: &[u8], base_url: Option<&str>) -> Option<PlaylistDocument> {
        let base = base_url.and_then(|b| Url::parse(b).ok());
        match parse_playlist_res(text) {
            Ok(Playlist::MasterPlaylist(pl)) => Some(from_master(pl, base.as_ref())),
            Ok(Playlist::MediaPlaylist(pl)) => Some(from_media(pl, base.as_ref())),
            Err(e) => {
                debug!("Failed to parse playlist: {e}");
                None
            }
        }
    }
}

fn from_master(playlist: MasterPlaylist, base: Option<&Url>) -> PlaylistDocument {
    let items = playlist
        .variants
        .into_iter()
        .filter(|v| !v.is_i_frame)
        .map(|v| {
            PlaylistItem::Variant(VariantDescriptor {
                bandwidth: v.bandwidth,
                resolution: v.resolution.map(|r| Resolution {
                    width: r.width,
                    height: r.height,
                }),
                codecs: v.codecs,
                url: resolve_uri(base, &v.uri),
            })
        })
        .collect();
    PlaylistDocument::new(items)
}

fn from_media(playlist: MediaPlaylist, base: Option<&Url>) -> PlaylistDocument {
    let items = playlist
        .segments
        .into_iter()
        .map(|s| PlaylistItem::direct(resolve_uri(base, &s.uri)))
        .collect();
    PlaylistDocument::new(items).with_end_list(playlist.end_list)
}

/// Resolve a playlist link against the base URL. Absolute links and links
/// that cannot be resolved are returned unchanged.
pub fn resolve_uri(base: Option<&Url>, uri: &str) -> String {
    let uri = uri.trim();
    if uri.is_empty() {
        return String::new();
    }
    match Url::parse(uri) {
        Ok(absolute) => absolute.to_string(),
        Err(url::ParseError::RelativeUrlWithoutBase) => match base.map(|b| b.join(uri)) {
            Some(Ok(resolved)) => resolved.to_string(),
            _ => {
                trace!(uri, "Leaving playlist link unresolved");
                uri.to_string()
            }
        },
        Err(_) => uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-STREAM-INF:BANDWIDTH=300000,RESOLUTION=640x360,CODECS=\"avc1.4d401e,mp4a.40.2\"\n\
        low/index.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720\n\
        http://cdn.example.com/hd/index.m3u8\n\
        #EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=90000,URI=\"iframes.m3u8\"\n";

    const MEDIA: &str = "#EXTM3U\n\
        #EXT-X-TARGETDURATION:6\n\
        #EXT-X-MEDIA-SEQUENCE:100\n\
        #EXTINF:6.0,\n\
        seg100.ts\n\
        #EXTINF:6.0,\n\
        /abs/seg101.ts\n";

    #[test]
    fn test_parse_master_playlist() {
        let doc = M3u8Parser
            .parse(MASTER.as_bytes(), Some("http://example.com"))
            .unwrap();
        assert!(!doc.end_list);
        assert_eq!(doc.items.len(), 2);

        let PlaylistItem::Variant(low) = &doc.items[0] else {
            panic!("expected a variant");
        };
        assert_eq!(low.bandwidth, 300_000);
        assert_eq!(
            low.resolution,
            Some(Resolution {
                width: 640,
                height: 360
            })
        );
        assert_eq!(low.codecs.as_deref(), Some("avc1.4d401e,mp4a.40.2"));
        assert_eq!(low.url, "http://example.com/low/index.m3u8");
        assert_eq!(doc.items[1].url(), "http://cdn.example.com/hd/index.m3u8");
    }

    #[test]
    fn test_parse_media_playlist() {
        let doc = M3u8Parser
            .parse(MEDIA.as_bytes(), Some("http://example.com:8080"))
            .unwrap();
        assert!(!doc.end_list);
        assert_eq!(
            doc.items,
            vec![
                PlaylistItem::direct("http://example.com:8080/seg100.ts"),
                PlaylistItem::direct("http://example.com:8080/abs/seg101.ts"),
            ]
        );
    }

    #[test]
    fn test_parse_end_list() {
        let text = format!("{MEDIA}#EXT-X-ENDLIST\n");
        let doc = M3u8Parser.parse(text.as_bytes(), None).unwrap();
        assert!(doc.end_list);
        assert_eq!(doc.items[0].url(), "seg100.ts");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(M3u8Parser.parse(b"not a playlist", None).is_none());
    }

    #[test]
    fn test_resolve_uri() {
        let base = Url::parse("https://example.com").unwrap();
        assert_eq!(resolve_uri(Some(&base), "a/b.ts"), "https://example.com/a/b.ts");
        assert_eq!(
            resolve_uri(Some(&base), "http://other/x.ts"),
            "http://other/x.ts"
        );
        assert_eq!(resolve_uri(None, "a/b.ts"), "a/b.ts");
        assert_eq!(resolve_uri(Some(&base), "  "), "");
    }

    #[test]
    fn test_resolution_display() {
        let res = Resolution {
            width: 1920,
            height: 1080,
        };
        assert_eq!(res.to_string(), "1920x1080");
    }
}
