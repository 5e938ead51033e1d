#![forbid(unsafe_code)]

//! Signal coalescing lanes.
//!
//! Hosts feed the engine three kinds of notifications: structural
//! changes (the item container's children changed), resizes, and scroll
//! position updates. Raw notification streams are bursty: a single
//! streaming response can fire hundreds of mutations, and interactive
//! resize fires continuously. Each kind gets its own coalescing
//! lane:
//!
//! - **structural**: debounced over a fixed window, latest-wins;
//! - **resize**: debounced, with an additional idle-priority settle
//!   deadline that re-runs geometry once interaction stops;
//! - **scroll**: coalesced to at most one pass per frame via a
//!   pending guard; the latest metrics win.
//!
//! There are no ambient timers. Deadlines are stored as instants and
//! drained by [`SignalScheduler::poll_at`], which the host calls from
//! its frame callback. Scheduling a lane that already has a deadline
//! replaces it, which is also how a pending timer is cancelled before
//! its successor is armed. [`SignalScheduler::clear`] drops every lane
//! on teardown.

use crate::geometry::ScrollMetrics;
use std::time::Duration;
use web_time::Instant;

/// Debounce window for structural-change notifications.
pub const STRUCTURAL_DEBOUNCE: Duration = Duration::from_millis(200);
/// Debounce window for resize notifications.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(150);
/// Idle delay before the post-resize settle pass.
pub const RESIZE_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Lane timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Structural-change debounce window.
    pub structural_debounce: Duration,
    /// Resize debounce window.
    pub resize_debounce: Duration,
    /// Delay after the last resize before the settle pass fires.
    pub resize_settle: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            structural_debounce: STRUCTURAL_DEBOUNCE,
            resize_debounce: RESIZE_DEBOUNCE,
            resize_settle: RESIZE_SETTLE_DELAY,
        }
    }
}

/// Work that became due in one [`SignalScheduler::poll_at`] call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DueWork {
    /// A structural recompute is due.
    pub structural: bool,
    /// A geometry-only resize recompute is due.
    pub resize: bool,
    /// The post-resize settle correction is due.
    pub resize_settle: bool,
    /// A coalesced scroll update is due, with the latest metrics.
    pub scroll: Option<ScrollMetrics>,
}

impl DueWork {
    /// Whether anything became due.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.structural && !self.resize && !self.resize_settle && self.scroll.is_none()
    }
}

/// Three-lane coalescer for host notifications.
///
/// Not thread-safe; the engine mutates it from the single cooperative
/// thread, matching the rest of the engine state.
#[derive(Debug, Clone, Default)]
pub struct SignalScheduler {
    config: SchedulerConfig,
    structural_deadline: Option<Instant>,
    resize_deadline: Option<Instant>,
    settle_deadline: Option<Instant>,
    pending_scroll: Option<ScrollMetrics>,
}

impl SignalScheduler {
    /// Create a scheduler with default lane timings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scheduler with explicit lane timings.
    #[must_use]
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Record a structural-change notification.
    ///
    /// Restarts the debounce window; any previously armed structural
    /// deadline is replaced.
    pub fn note_structural_at(&mut self, now: Instant) {
        self.structural_deadline = Some(now + self.config.structural_debounce);
    }

    /// Record a resize notification.
    ///
    /// Restarts both the resize debounce and the idle settle deadline.
    pub fn note_resize_at(&mut self, now: Instant) {
        self.resize_deadline = Some(now + self.config.resize_debounce);
        self.settle_deadline = Some(now + self.config.resize_settle);
    }

    /// Record a scroll notification.
    ///
    /// Returns `true` if this arms the frame guard (no scroll pass was
    /// pending), `false` if an earlier scroll is already waiting for
    /// the next poll; in that case only the metrics are refreshed.
    pub fn note_scroll(&mut self, metrics: ScrollMetrics) -> bool {
        let newly_pending = self.pending_scroll.is_none();
        self.pending_scroll = Some(metrics);
        newly_pending
    }

    /// Drain every lane whose deadline has passed.
    ///
    /// The scroll lane has no deadline: whatever is pending is always
    /// drained, giving at-most-one scroll pass per poll (per frame,
    /// when the host polls from its frame callback).
    pub fn poll_at(&mut self, now: Instant) -> DueWork {
        let mut due = DueWork {
            scroll: self.pending_scroll.take(),
            ..DueWork::default()
        };

        if self.structural_deadline.is_some_and(|d| d <= now) {
            self.structural_deadline = None;
            due.structural = true;
        }
        if self.resize_deadline.is_some_and(|d| d <= now) {
            self.resize_deadline = None;
            due.resize = true;
        }
        // The settle pass never fires in the same poll as the resize
        // pass it follows.
        if !due.resize && self.settle_deadline.is_some_and(|d| d <= now) {
            self.settle_deadline = None;
            due.resize_settle = true;
        }

        if !due.is_empty() {
            tracing::trace!(
                structural = due.structural,
                resize = due.resize,
                settle = due.resize_settle,
                scroll = due.scroll.is_some(),
                "signal lanes due"
            );
        }
        due
    }

    /// Whether any lane holds pending work.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.structural_deadline.is_some()
            || self.resize_deadline.is_some()
            || self.settle_deadline.is_some()
            || self.pending_scroll.is_some()
    }

    /// The earliest armed deadline, if any.
    ///
    /// Hosts that schedule their own wakeups can sleep until this
    /// instant; a pending scroll is frame-driven and not reported here.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.structural_deadline,
            self.resize_deadline,
            self.settle_deadline,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Drop all pending work and deadlines.
    pub fn clear(&mut self) {
        self.structural_deadline = None;
        self.resize_deadline = None;
        self.settle_deadline = None;
        self.pending_scroll = None;
    }
}
