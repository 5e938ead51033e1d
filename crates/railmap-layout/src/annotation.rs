#![forbid(unsafe_code)]

//! Floating annotation placement.
//!
//! An annotation is a lightweight panel anchored to a marker or rail
//! button. It stacks above the anchor when there is room (below
//! otherwise), expands horizontally to one of a fixed ladder of width
//! tiers on a preferred side, flips to the opposite side when not even
//! the narrowest tier fits, and is finally clamped into the viewport.
//! Because clamping can slide the box off-center, the placement also
//! yields an arrow offset that keeps the visual pointer aimed at the
//! anchor.

use railmap_core::RectF;

/// Candidate content widths, widest first.
pub const WIDTH_TIERS: [f64; 4] = [280.0, 240.0, 200.0, 160.0];
/// Fixed padding kept between the annotation and the viewport edges.
pub const EDGE_PADDING: f64 = 8.0;
/// Minimum distance of the arrow from either end of the annotation.
pub const ARROW_INSET: f64 = 12.0;
/// Default gap between the anchor and the annotation.
pub const ANCHOR_GAP: f64 = 8.0;

/// Horizontal expansion side, relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The box extends leftward; its right edge stays near the anchor.
    Left,
    /// The box extends rightward; its left edge stays near the anchor.
    Right,
}

impl Side {
    /// The opposite side, for flip logic.
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Vertical stacking relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stack {
    /// Above the anchor.
    Above,
    /// Below the anchor.
    Below,
}

/// A placed annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotationArea {
    /// Final clamped rectangle in viewport coordinates.
    pub rect: RectF,
    /// Chosen expansion side (after any flip).
    pub side: Side,
    /// Chosen vertical stacking.
    pub stack: Stack,
    /// Arrow offset from the rectangle's left edge, aimed at the
    /// anchor's horizontal center and kept at least [`ARROW_INSET`]
    /// from either end.
    pub arrow_x: f64,
}

/// Configuration for one annotation placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotation {
    /// The anchor rectangle to position relative to.
    pub anchor: RectF,
    /// Preferred expansion side.
    pub preferred: Side,
    /// Gap between anchor and annotation.
    pub gap: f64,
    /// Padding kept to the viewport edges.
    pub edge_padding: f64,
}

impl Annotation {
    /// Create an annotation anchored to the given rectangle.
    #[must_use]
    pub fn new(anchor: RectF, preferred: Side) -> Self {
        Self {
            anchor,
            preferred,
            gap: ANCHOR_GAP,
            edge_padding: EDGE_PADDING,
        }
    }

    /// Set the anchor gap.
    #[must_use]
    pub fn gap(mut self, gap: f64) -> Self {
        self.gap = gap;
        self
    }

    /// Set the viewport edge padding.
    #[must_use]
    pub fn edge_padding(mut self, padding: f64) -> Self {
        self.edge_padding = padding;
        self
    }

    /// Horizontal space available for the given side.
    fn available_width(&self, side: Side, viewport: RectF) -> f64 {
        match side {
            Side::Left => self.anchor.right() - (viewport.x + self.edge_padding),
            Side::Right => (viewport.right() - self.edge_padding) - self.anchor.x,
        }
    }

    /// Choose the expansion side and the widest fitting tier.
    ///
    /// Tries the preferred side first; if not even the narrowest tier
    /// fits there, flips and retries. When neither side can hold the
    /// narrowest tier, the side with more room wins and the narrowest
    /// tier is used anyway (the final clamp keeps it on screen).
    #[must_use]
    pub fn choose_width(&self, viewport: RectF) -> (Side, f64) {
        let narrowest = WIDTH_TIERS[WIDTH_TIERS.len() - 1];

        let preferred_avail = self.available_width(self.preferred, viewport);
        if let Some(w) = fit_tier(preferred_avail) {
            return (self.preferred, w);
        }

        let flipped = self.preferred.flip();
        let flipped_avail = self.available_width(flipped, viewport);
        if let Some(w) = fit_tier(flipped_avail) {
            return (flipped, w);
        }

        if flipped_avail > preferred_avail {
            (flipped, narrowest)
        } else {
            (self.preferred, narrowest)
        }
    }

    /// Place the annotation at an already-chosen side and width.
    ///
    /// Returns `None` when the viewport is degenerate (no usable area
    /// once edge padding is applied).
    #[must_use]
    pub fn place(
        &self,
        viewport: RectF,
        side: Side,
        width: f64,
        height: f64,
    ) -> Option<AnnotationArea> {
        let usable_w = viewport.width - 2.0 * self.edge_padding;
        let usable_h = viewport.height - 2.0 * self.edge_padding;
        if usable_w <= 0.0 || usable_h <= 0.0 || width <= 0.0 || height <= 0.0 {
            return None;
        }

        let width = width.min(usable_w);
        let height = height.min(usable_h);

        // Stack above when the box fits between the anchor and the top
        // edge, otherwise below.
        let space_above = self.anchor.y - self.gap - (viewport.y + self.edge_padding);
        let (stack, y) = if space_above >= height {
            (Stack::Above, self.anchor.y - self.gap - height)
        } else {
            (Stack::Below, self.anchor.bottom() + self.gap)
        };

        let x = match side {
            Side::Left => self.anchor.right() - width,
            Side::Right => self.anchor.x,
        };

        let min_x = viewport.x + self.edge_padding;
        let max_x = viewport.right() - self.edge_padding - width;
        let min_y = viewport.y + self.edge_padding;
        let max_y = viewport.bottom() - self.edge_padding - height;

        let rect = RectF::new(x.clamp(min_x, max_x), y.clamp(min_y, max_y), width, height);

        // The clamp may have slid the box away from the anchor; aim
        // the arrow back at the anchor's center, but keep it on the
        // box. Boxes narrower than two insets pin the arrow to their
        // midpoint.
        let lo = ARROW_INSET.min(width / 2.0);
        let hi = (width - ARROW_INSET).max(lo);
        let arrow_x = (self.anchor.center_x() - rect.x).clamp(lo, hi);

        Some(AnnotationArea {
            rect,
            side,
            stack,
            arrow_x,
        })
    }

    /// Choose side and width, then place: the one-call form.
    #[must_use]
    pub fn resolve(&self, viewport: RectF, height: f64) -> Option<AnnotationArea> {
        let (side, width) = self.choose_width(viewport);
        self.place(viewport, side, width, height)
    }
}

/// Widest tier that fits the available space, if any.
fn fit_tier(available: f64) -> Option<f64> {
    WIDTH_TIERS.iter().copied().find(|w| *w <= available)
}
