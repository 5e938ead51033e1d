#![forbid(unsafe_code)]

//! Rail geometry: normalized positions and the min-gap clamp.
//!
//! Items arrive as raw document offsets. The solver normalizes them
//! into `[0, 1]`, sizes a long canvas tall enough to give every marker
//! its minimum gap, projects the normalized positions onto that canvas,
//! and then runs a monotonic clamp so adjacent markers never sit closer
//! than the configured gap while order and track bounds are preserved.
//!
//! The clamp is a 1-D interval-scheduling instance with fixed slack:
//! one forward pass, one backward re-clamp from the upper bound, and at
//! most one more forward pass reach a fixed point. The canvas is sized
//! so a feasible layout always exists; if a caller hands in a geometry
//! where it does not, gaps degrade below the minimum instead of
//! failing.

use railmap_core::geometry::clamp01;
use serde::{Deserialize, Serialize};

/// Default padding above the first and below the last marker.
pub const DEFAULT_TRACK_PADDING: f64 = 20.0;
/// Default minimum pixel distance between adjacent markers.
pub const DEFAULT_MIN_GAP: f64 = 40.0;

/// Rail track configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RailGeometry {
    /// Pixel height of the visible track.
    pub track_height: f64,
    /// Padding inside the canvas at both ends.
    pub track_padding: f64,
    /// Minimum pixel gap between adjacent markers.
    pub min_gap: f64,
}

impl Default for RailGeometry {
    fn default() -> Self {
        Self {
            track_height: 480.0,
            track_padding: DEFAULT_TRACK_PADDING,
            min_gap: DEFAULT_MIN_GAP,
        }
    }
}

/// Solved rail layout for one item set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RailLayout {
    /// Long-canvas height; never below the visible track height.
    pub content_height: f64,
    /// `content_height / track_height`.
    pub scale: f64,
    /// Pixel offset of each marker within the long canvas, sorted.
    pub y_positions: Vec<f64>,
    /// Normalized position before gap correction; stable until the
    /// item set changes.
    pub base_n: Vec<f64>,
    /// Normalized position re-derived from the corrected pixels.
    pub n: Vec<f64>,
}

impl RailLayout {
    /// Number of laid-out markers.
    #[inline]
    pub fn len(&self) -> usize {
        self.y_positions.len()
    }

    /// Whether the layout holds no markers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y_positions.is_empty()
    }
}

impl RailGeometry {
    /// Create a geometry for the given visible track height, with
    /// default padding and gap.
    #[must_use]
    pub fn new(track_height: f64) -> Self {
        Self {
            track_height,
            ..Self::default()
        }
    }

    /// Set the track padding.
    #[must_use]
    pub fn padding(mut self, padding: f64) -> Self {
        self.track_padding = padding;
        self
    }

    /// Set the minimum marker gap.
    #[must_use]
    pub fn min_gap(mut self, gap: f64) -> Self {
        self.min_gap = gap;
        self
    }

    /// Long-canvas height for `count` markers: tall enough for every
    /// gap, never shorter than the visible track.
    pub fn content_height_for(&self, count: usize) -> f64 {
        let needed = 2.0 * self.track_padding + count.saturating_sub(1) as f64 * self.min_gap;
        self.track_height.max(needed)
    }

    /// Solve the layout for ordered item offsets.
    ///
    /// Offsets are distances from the document container; only their
    /// span matters, so absolute or first-item-relative conventions
    /// both work. Non-finite offsets are treated as the previous
    /// offset.
    pub fn solve(&self, offsets: &[f64]) -> RailLayout {
        let count = offsets.len();
        if count == 0 {
            return RailLayout {
                content_height: self.content_height_for(0),
                scale: self.scale_for(self.content_height_for(0)),
                ..RailLayout::default()
            };
        }

        let first = if offsets[0].is_finite() {
            offsets[0]
        } else {
            0.0
        };
        let mut rels = Vec::with_capacity(count);
        let mut prev = 0.0;
        for &offset in offsets {
            let rel = if offset.is_finite() {
                offset - first
            } else {
                prev
            };
            prev = rel;
            rels.push(rel);
        }
        // Minimum 1 to avoid division by zero for single or coincident
        // items.
        let span = rels[count - 1].max(1.0);
        let base_n: Vec<f64> = rels.iter().map(|&rel| clamp01(rel / span)).collect();

        let content_height = self.content_height_for(count);
        let usable = (content_height - 2.0 * self.track_padding).max(0.0);
        let lower = self.track_padding;
        let upper = content_height - self.track_padding;

        let mut y: Vec<f64> = base_n.iter().map(|n| lower + n * usable).collect();
        self.clamp_min_gap(&mut y, lower, upper);

        let n = y
            .iter()
            .map(|&pos| {
                if usable <= f64::EPSILON {
                    0.0
                } else {
                    clamp01((pos - lower) / usable)
                }
            })
            .collect();

        tracing::debug!(count, content_height, "rail layout solved");

        RailLayout {
            content_height,
            scale: self.scale_for(content_height),
            y_positions: y,
            base_n,
            n,
        }
    }

    fn scale_for(&self, content_height: f64) -> f64 {
        if self.track_height <= 0.0 {
            1.0
        } else {
            content_height / self.track_height
        }
    }

    /// Monotonic minimum-gap clamp.
    ///
    /// Forward pass pushes positions down the canvas; if the last item
    /// overflows the upper bound, a backward pass pulls everything back
    /// up; if that pushed the first item above the lower bound, one
    /// final forward pass restores it. Order is preserved throughout.
    fn clamp_min_gap(&self, y: &mut [f64], lower: f64, upper: f64) {
        let gap = self.min_gap;
        if y.is_empty() {
            return;
        }

        y[0] = y[0].max(lower);
        for i in 1..y.len() {
            if y[i] < y[i - 1] + gap {
                y[i] = y[i - 1] + gap;
            }
        }

        let last = y.len() - 1;
        if y[last] > upper {
            y[last] = upper;
            for i in (0..last).rev() {
                if y[i] > y[i + 1] - gap {
                    y[i] = y[i + 1] - gap;
                }
            }
        }

        if y[0] < lower {
            y[0] = lower;
            for i in 1..y.len() {
                if y[i] < y[i - 1] + gap {
                    y[i] = y[i - 1] + gap;
                }
            }
        }
    }
}
