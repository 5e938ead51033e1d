#![forbid(unsafe_code)]

//! Active-item tracking.
//!
//! As the user scrolls the content pane, exactly one item counts as
//! "active". A reference line sits at a fixed fraction of the viewport
//! height; the active item is the last one whose on-screen top is at or
//! above that line and which is at least partially visible. Hard
//! boundary rules pin the first/last item when scroll reaches either
//! end of the content, for both normal and inverted scroll-origin
//! conventions.
//!
//! Rapid scrolling can flip the computed candidate many times per
//! second. Changes are rate-limited: a candidate arriving sooner than
//! the minimum interval after the previous applied change is held
//! pending (latest candidate wins) and applied by [`ActiveTracker::poll_at`]
//! once the interval lapses.
//!
//! The tracker works in marker indices; the controller owns the
//! index-to-id mapping and resets the tracker whenever markers rebuild.

use railmap_core::ScrollMetrics;
use std::time::Duration;
use web_time::Instant;

/// Fraction of the viewport height where the reference line sits,
/// measured from the top edge. Fixed regardless of marker density;
/// kept configurable on [`ActiveConfig`] pending a product decision on
/// density-aware scaling.
pub const REFERENCE_LINE_RATIO: f64 = 0.45;
/// Scroll distance from either content end that force-activates the
/// boundary marker.
pub const EDGE_EPSILON: f64 = 2.0;
/// Minimum interval between applied active changes.
pub const MIN_CHANGE_INTERVAL: Duration = Duration::from_millis(250);

/// Which end of the content the host's scroll offset grows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollOrigin {
    /// Offset zero is the top of the content.
    #[default]
    TopDown,
    /// Offset zero is the bottom of the content (inverted panes).
    BottomUp,
}

/// Tracker configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveConfig {
    /// Reference-line position as a fraction of viewport height.
    pub reference_line_ratio: f64,
    /// Boundary epsilon in pixels.
    pub edge_epsilon: f64,
    /// Minimum interval between applied changes.
    pub min_change_interval: Duration,
    /// Scroll-origin convention of the host pane.
    pub scroll_origin: ScrollOrigin,
}

impl Default for ActiveConfig {
    fn default() -> Self {
        Self {
            reference_line_ratio: REFERENCE_LINE_RATIO,
            edge_epsilon: EDGE_EPSILON,
            min_change_interval: MIN_CHANGE_INTERVAL,
            scroll_origin: ScrollOrigin::TopDown,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    candidate: usize,
    due: Instant,
}

/// Rate-limited active-item state machine.
#[derive(Debug, Default)]
pub struct ActiveTracker {
    config: ActiveConfig,
    active: Option<usize>,
    last_change: Option<Instant>,
    pending: Option<Pending>,
}

impl ActiveTracker {
    /// Create a tracker with the given configuration.
    #[must_use]
    pub fn new(config: ActiveConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Currently active marker index.
    #[inline]
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// When the held pending candidate becomes applicable.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.due)
    }

    /// Feed a scroll observation.
    ///
    /// Returns the newly applied active index, or `None` when nothing
    /// changed or the change was deferred.
    pub fn observe_at(
        &mut self,
        offsets: &[f64],
        metrics: ScrollMetrics,
        now: Instant,
    ) -> Option<usize> {
        let candidate = compute_candidate(offsets, metrics, &self.config)?;
        self.consider(candidate, now)
    }

    /// Apply a held candidate whose interval has lapsed.
    pub fn poll_at(&mut self, now: Instant) -> Option<usize> {
        let pending = self.pending?;
        if pending.due > now {
            return None;
        }
        self.pending = None;
        if Some(pending.candidate) == self.active {
            return None;
        }
        self.active = Some(pending.candidate);
        self.last_change = Some(now);
        Some(pending.candidate)
    }

    /// Force the active index, bypassing the rate gate (explicit
    /// jumps). Returns the index when it actually changed.
    pub fn set_active_at(&mut self, index: usize, now: Instant) -> Option<usize> {
        self.pending = None;
        if Some(index) == self.active {
            return None;
        }
        self.active = Some(index);
        self.last_change = Some(now);
        Some(index)
    }

    /// Forget all state (marker rebuild or teardown).
    pub fn reset(&mut self) {
        self.active = None;
        self.last_change = None;
        self.pending = None;
    }

    fn consider(&mut self, candidate: usize, now: Instant) -> Option<usize> {
        if Some(candidate) == self.active {
            // The latest candidate is already current: drop any older
            // pending change instead of applying it later.
            self.pending = None;
            return None;
        }
        match self.last_change {
            Some(t) if now.duration_since(t) < self.config.min_change_interval => {
                self.pending = Some(Pending {
                    candidate,
                    due: t + self.config.min_change_interval,
                });
                None
            }
            _ => {
                self.pending = None;
                self.active = Some(candidate);
                self.last_change = Some(now);
                Some(candidate)
            }
        }
    }
}

/// Compute the active candidate for a scroll position.
///
/// `offsets` are document-pixel item tops in the same coordinate space
/// as `metrics`; an item's extent runs to the next item's offset (the
/// last item runs to the content end).
fn compute_candidate(
    offsets: &[f64],
    metrics: ScrollMetrics,
    config: &ActiveConfig,
) -> Option<usize> {
    let count = offsets.len();
    if count == 0 {
        return None;
    }

    // Normalize inverted panes to top-down scroll.
    let st = match config.scroll_origin {
        ScrollOrigin::TopDown => metrics.scroll_top,
        ScrollOrigin::BottomUp => metrics.max_scroll() - metrics.scroll_top,
    };

    if st <= config.edge_epsilon {
        return Some(0);
    }
    if st >= metrics.max_scroll() - config.edge_epsilon {
        return Some(count - 1);
    }

    let reference_line = config.reference_line_ratio * metrics.viewport_height;
    let view_bottom = st + metrics.viewport_height;

    let mut active = None;
    for i in 0..count {
        let top = offsets[i];
        let end = if i + 1 < count {
            offsets[i + 1]
        } else {
            metrics.content_height.max(top)
        };
        let visible = top < view_bottom && end > st;
        if visible && top - st <= reference_line {
            active = Some(i);
        }
    }

    active.or_else(|| {
        // The reference line sits above the topmost visible item: fall
        // back to the nearest item above the viewport, else the first.
        let above = offsets.partition_point(|&o| o < st);
        Some(above.saturating_sub(1))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFSETS: [f64; 4] = [0.0, 300.0, 600.0, 900.0];

    fn metrics(scroll_top: f64) -> ScrollMetrics {
        ScrollMetrics::new(scroll_top, 500.0, 1200.0)
    }

    fn candidate(offsets: &[f64], m: ScrollMetrics) -> Option<usize> {
        compute_candidate(offsets, m, &ActiveConfig::default())
    }

    #[test]
    fn empty_offsets_have_no_candidate() {
        assert_eq!(candidate(&[], metrics(100.0)), None);
    }

    #[test]
    fn scroll_top_activates_first() {
        assert_eq!(candidate(&OFFSETS, metrics(0.0)), Some(0));
        assert_eq!(candidate(&OFFSETS, metrics(1.5)), Some(0));
    }

    #[test]
    fn scroll_bottom_activates_last() {
        // max_scroll = 700.
        assert_eq!(candidate(&OFFSETS, metrics(700.0)), Some(3));
        assert_eq!(candidate(&OFFSETS, metrics(698.5)), Some(3));
    }

    #[test]
    fn boundary_rules_hold_for_single_item() {
        assert_eq!(candidate(&[0.0], metrics(0.0)), Some(0));
        assert_eq!(candidate(&[0.0], metrics(700.0)), Some(0));
    }

    #[test]
    fn reference_line_selects_last_item_above_it() {
        // st=100: on-screen tops are -100, 200, 500, 800; the line is
        // at 225, so item 1 is the last qualifying one.
        assert_eq!(candidate(&OFFSETS, metrics(100.0)), Some(1));
    }

    #[test]
    fn item_crossing_the_line_takes_over() {
        // st=400: tops -400, -100, 200, 500; item 2 qualifies.
        assert_eq!(candidate(&OFFSETS, metrics(400.0)), Some(2));
    }

    #[test]
    fn falls_back_to_first_when_content_starts_low() {
        // First item far below the reference line; nothing above the
        // viewport either.
        let offsets = [400.0, 800.0];
        let m = ScrollMetrics::new(10.0, 500.0, 1200.0);
        assert_eq!(candidate(&offsets, m), Some(0));
    }

    #[test]
    fn inverted_origin_swaps_boundaries() {
        let config = ActiveConfig {
            scroll_origin: ScrollOrigin::BottomUp,
            ..ActiveConfig::default()
        };
        // Offset 0 in a bottom-up pane means "at the bottom".
        assert_eq!(
            compute_candidate(&OFFSETS, metrics(0.0), &config),
            Some(3)
        );
        assert_eq!(
            compute_candidate(&OFFSETS, metrics(700.0), &config),
            Some(0)
        );
    }

    #[test]
    fn immediate_change_when_interval_elapsed() {
        let t0 = Instant::now();
        let mut tracker = ActiveTracker::new(ActiveConfig::default());
        assert_eq!(tracker.observe_at(&OFFSETS, metrics(0.0), t0), Some(0));
        assert_eq!(tracker.active(), Some(0));

        let t1 = t0 + MIN_CHANGE_INTERVAL;
        assert_eq!(tracker.observe_at(&OFFSETS, metrics(400.0), t1), Some(2));
        assert_eq!(tracker.active(), Some(2));
    }

    #[test]
    fn rapid_changes_coalesce_to_one() {
        let t0 = Instant::now();
        let mut tracker = ActiveTracker::new(ActiveConfig::default());
        tracker.observe_at(&OFFSETS, metrics(0.0), t0);

        // Two candidates inside the interval: both deferred.
        let a = tracker.observe_at(&OFFSETS, metrics(100.0), t0 + Duration::from_millis(50));
        let b = tracker.observe_at(&OFFSETS, metrics(400.0), t0 + Duration::from_millis(100));
        assert_eq!(a, None);
        assert_eq!(b, None);
        assert_eq!(tracker.active(), Some(0), "no change applied yet");

        // Early poll does nothing; the deadline poll applies exactly
        // the latest candidate.
        assert_eq!(tracker.poll_at(t0 + Duration::from_millis(200)), None);
        let applied = tracker.poll_at(t0 + MIN_CHANGE_INTERVAL);
        assert_eq!(applied, Some(2));
        assert_eq!(tracker.active(), Some(2));
        // Nothing left pending.
        assert_eq!(tracker.poll_at(t0 + Duration::from_secs(5)), None);
    }

    #[test]
    fn pending_dropped_when_candidate_returns_to_current() {
        let t0 = Instant::now();
        let mut tracker = ActiveTracker::new(ActiveConfig::default());
        tracker.observe_at(&OFFSETS, metrics(0.0), t0);

        tracker.observe_at(&OFFSETS, metrics(400.0), t0 + Duration::from_millis(50));
        assert!(tracker.next_deadline().is_some());

        // Scrolling back before the deadline cancels the change.
        tracker.observe_at(&OFFSETS, metrics(0.0), t0 + Duration::from_millis(100));
        assert_eq!(tracker.next_deadline(), None);
        assert_eq!(tracker.poll_at(t0 + Duration::from_secs(1)), None);
        assert_eq!(tracker.active(), Some(0));
    }

    #[test]
    fn set_active_bypasses_gate() {
        let t0 = Instant::now();
        let mut tracker = ActiveTracker::new(ActiveConfig::default());
        tracker.observe_at(&OFFSETS, metrics(0.0), t0);
        assert_eq!(
            tracker.set_active_at(3, t0 + Duration::from_millis(10)),
            Some(3)
        );
        assert_eq!(tracker.active(), Some(3));
        assert_eq!(tracker.set_active_at(3, t0 + Duration::from_millis(20)), None);
    }

    #[test]
    fn reset_clears_everything() {
        let t0 = Instant::now();
        let mut tracker = ActiveTracker::new(ActiveConfig::default());
        tracker.observe_at(&OFFSETS, metrics(0.0), t0);
        tracker.observe_at(&OFFSETS, metrics(400.0), t0 + Duration::from_millis(10));
        tracker.reset();
        assert_eq!(tracker.active(), None);
        assert_eq!(tracker.next_deadline(), None);
    }

    #[test]
    fn boundaries_hold_for_any_item_count() {
        // Regardless of where the reference line lands, the edges win.
        for n in 1..=5usize {
            let offsets: Vec<f64> = (0..n).map(|i| i as f64 * 200.0).collect();
            let m = ScrollMetrics::new(0.0, 500.0, 1200.0);
            assert_eq!(candidate(&offsets, m), Some(0));
            let m = ScrollMetrics::new(700.0, 500.0, 1200.0);
            assert_eq!(candidate(&offsets, m), Some(n - 1));
        }
    }
}
