#![forbid(unsafe_code)]

//! Virtualization window over the long canvas.
//!
//! Item counts reach into the thousands, so only the markers inside the
//! current scroll window (plus a buffer) carry render instances. The
//! window is found by binary search over the sorted pixel positions;
//! successive windows are reconciled into a small diff of entered,
//! exited, and retained indices.
//!
//! Every full geometry rebuild bumps a [`LayoutVersion`]. A window pass
//! computed against an older version is a designed race-loser: the
//! caller discards it instead of applying stale writes.

use smallvec::SmallVec;

/// Default minimum look-ahead buffer around the scroll window.
pub const DEFAULT_MIN_BUFFER: f64 = 200.0;

/// Monotonic counter identifying one geometry generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct LayoutVersion(u64);

impl LayoutVersion {
    /// Advance to the next generation and return it.
    pub fn bump(&mut self) -> Self {
        self.0 = self.0.wrapping_add(1);
        *self
    }

    /// The raw counter value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// First index whose value is `>= x`.
///
/// Assumes `xs` is sorted ascending; returns `xs.len()` when every
/// value is below `x`.
pub fn lower_bound(xs: &[f64], x: f64) -> usize {
    xs.partition_point(|&v| v < x)
}

/// Last index whose value is `<= x`, or `None` when every value is
/// above `x`.
///
/// Assumes `xs` is sorted ascending.
pub fn upper_bound(xs: &[f64], x: f64) -> Option<usize> {
    xs.partition_point(|&v| v <= x).checked_sub(1)
}

/// Half-open index range of markers inside the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibleRange {
    /// First rendered index.
    pub start: usize,
    /// One past the last rendered index.
    pub end: usize,
}

impl VisibleRange {
    /// An empty range.
    pub const EMPTY: VisibleRange = VisibleRange { start: 0, end: 0 };

    /// Range over `[start, end)`.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Number of indices inside the range.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the range holds no indices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether an index lies inside the range.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    /// Iterate the contained indices.
    pub fn indices(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    /// Compute the window for a long-canvas scroll position.
    ///
    /// `scroll_top` is the long-canvas offset, `viewport_height` the
    /// visible track height. The buffer extends the window on both
    /// sides and is never smaller than the viewport itself.
    pub fn compute(
        y_positions: &[f64],
        scroll_top: f64,
        viewport_height: f64,
        min_buffer: f64,
    ) -> Self {
        if y_positions.is_empty() {
            return Self::EMPTY;
        }
        let buffer = min_buffer.max(viewport_height);
        let min_y = scroll_top - buffer;
        let max_y = scroll_top + viewport_height + buffer;

        let start = lower_bound(y_positions, min_y);
        let end = y_positions.partition_point(|&v| v <= max_y);
        Self::new(start, end)
    }
}

/// Index diff between two successive windows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WindowDiff {
    /// Indices whose render instances must be released.
    pub exited: SmallVec<[usize; 8]>,
    /// Indices that need fresh render instances.
    pub entered: SmallVec<[usize; 8]>,
    /// Indices that stay rendered and only need a position update.
    pub retained: SmallVec<[usize; 8]>,
    /// Nothing was previously rendered: callers should clear and build
    /// instead of diffing.
    pub rebuild: bool,
}

impl WindowDiff {
    /// Diff `next` against `prev`.
    ///
    /// When `prev` is empty there is nothing to diff against; the
    /// result is flagged as a full rebuild with every `next` index in
    /// `entered`.
    pub fn between(prev: VisibleRange, next: VisibleRange) -> Self {
        if prev.is_empty() {
            return Self {
                entered: next.indices().collect(),
                rebuild: true,
                ..Self::default()
            };
        }

        let mut diff = Self::default();
        for i in prev.indices() {
            if !next.contains(i) {
                diff.exited.push(i);
            }
        }
        for i in next.indices() {
            if prev.contains(i) {
                diff.retained.push(i);
            } else {
                diff.entered.push(i);
            }
        }
        tracing::trace!(
            entered = diff.entered.len(),
            exited = diff.exited.len(),
            retained = diff.retained.len(),
            "window reconciled"
        );
        diff
    }

    /// Whether the diff carries no work at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exited.is_empty() && self.entered.is_empty() && self.retained.is_empty()
    }
}
