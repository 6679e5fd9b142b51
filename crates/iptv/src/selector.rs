//! # Playlist selection
//!
//! Picks the next URL to fetch from a parsed playlist. A direct media entry
//! always wins and is removed from the document, so the remainder can be
//! kept for the next decision. Otherwise the variant with the largest
//! resolution is chosen, where a candidate only replaces the current best if
//! *both* its width and its height are strictly larger.

use tracing::debug;

use crate::playlist::{PlaylistDocument, PlaylistItem, VariantDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    Direct(String),
    Variant(VariantDescriptor),
}

#[derive(Debug)]
pub struct Selection {
    pub pick: Option<Pick>,
    /// The input document, minus the picked direct entry
    pub document: PlaylistDocument,
}

/// Choose the next entry of `document`. Variants are only considered when
/// no media URL has been chosen yet (`chosen_url` is `None`).
pub fn select(
    mut document: PlaylistDocument,
    chosen_url: Option<&str>,
    min_bandwidth: u64,
) -> Selection {
    let direct = document
        .items
        .iter()
        .position(|item| matches!(item, PlaylistItem::Direct { url } if !url.is_empty()));
    if let Some(idx) = direct {
        let url = document.items.remove(idx).into_url();
        return Selection {
            pick: Some(Pick::Direct(url)),
            document,
        };
    }

    if chosen_url.is_some() {
        return Selection {
            pick: None,
            document,
        };
    }

    let mut best: Option<&VariantDescriptor> = None;
    let (mut best_width, mut best_height) = (0, 0);
    for item in &document.items {
        let PlaylistItem::Variant(variant) = item else {
            continue;
        };
        let (width, height) = variant
            .resolution
            .map(|r| (r.width, r.height))
            .unwrap_or_default();
        if !variant.url.is_empty()
            && variant.bandwidth > min_bandwidth
            && best_width < width
            && best_height < height
        {
            best = Some(variant);
            best_width = width;
            best_height = height;
        }
    }

    let pick = best.cloned().map(Pick::Variant);
    Selection { pick, document }
}

/// Selection state carried by a session across playlist responses.
#[derive(Debug, Default)]
pub struct SelectorState {
    media_url: Option<String>,
    second_level: bool,
}

impl SelectorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The variant playlist URL chosen so far
    pub fn media_url(&self) -> Option<&str> {
        self.media_url.as_deref()
    }

    /// Whether the concrete media playlist below a variant has been reached
    pub fn second_level(&self) -> bool {
        self.second_level
    }

    pub fn leave_second_level(&mut self) {
        self.second_level = false;
    }

    pub fn clear(&mut self) {
        self.media_url = None;
        self.second_level = false;
    }

    /// Run [`select`] and record its outcome. Returns the URL to fetch next
    /// and the remaining document.
    pub fn select(
        &mut self,
        document: PlaylistDocument,
        min_bandwidth: u64,
    ) -> (Option<String>, PlaylistDocument) {
        let Selection { pick, document } = select(document, self.media_url(), min_bandwidth);
        let url = match pick {
            Some(Pick::Direct(url)) => {
                if self.media_url.is_some() {
                    self.second_level = true;
                }
                Some(url)
            }
            Some(Pick::Variant(variant)) => {
                debug!(
                    resolution = ?variant.resolution.map(|r| r.to_string()),
                    kbps = variant.bandwidth / 1024,
                    codecs = ?variant.codecs,
                    "HLS - selected stream"
                );
                self.media_url = Some(variant.url.clone());
                Some(variant.url)
            }
            None => None,
        };
        (url, document)
    }
}
