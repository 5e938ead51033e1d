#![forbid(unsafe_code)]

//! Marker records.
//!
//! A [`Marker`] is the engine's record for one content item: a stable
//! id supplied by the item source, an opaque handle to the underlying
//! item (owned by the host document, not by the engine), the extracted
//! summary text, the normalized rail position, and the render handle
//! that exists only while the marker sits inside the virtualization
//! window.

use bitflags::bitflags;
use std::fmt;

/// Stable identifier for one content item within a document instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(String);

impl MarkerId {
    /// Create an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarkerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for MarkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

bitflags! {
    /// Persisted per-marker presentation flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MarkerFlags: u8 {
        /// The user starred this item.
        const STARRED = 1 << 0;
        /// The user pinned this item.
        const PINNED = 1 << 1;
    }
}

/// Engine record for one content item.
///
/// `I` is the host's opaque item handle; `H` is the rendering surface's
/// per-marker handle. The item handle's lifetime is controlled by the
/// host document; the engine only carries it back to collaborators.
#[derive(Debug, Clone)]
pub struct Marker<I, H> {
    /// Stable id, unique within the document instance.
    pub id: MarkerId,
    /// Opaque handle to the underlying content item.
    pub item: I,
    /// Extracted display text; truncated only at render time.
    pub summary: String,
    /// Normalized position derived from the raw document offset.
    /// Stable until the item set changes.
    pub base_n: f64,
    /// Normalized position after min-gap correction, in `[0, 1]`.
    pub n: f64,
    /// Render instance, present only inside the virtualization window.
    pub render: Option<H>,
    /// Persisted star/pin state.
    pub flags: MarkerFlags,
}

impl<I, H> Marker<I, H> {
    /// Create a marker with no render instance and default flags.
    pub fn new(id: MarkerId, item: I, summary: String) -> Self {
        Self {
            id,
            item,
            summary,
            base_n: 0.0,
            n: 0.0,
            render: None,
            flags: MarkerFlags::empty(),
        }
    }

    /// Whether the marker currently has a live render instance.
    #[inline]
    pub fn is_rendered(&self) -> bool {
        self.render.is_some()
    }

    /// Set or clear a flag, returning whether the value changed.
    pub fn set_flag(&mut self, flag: MarkerFlags, on: bool) -> bool {
        let before = self.flags;
        self.flags.set(flag, on);
        self.flags != before
    }
}
