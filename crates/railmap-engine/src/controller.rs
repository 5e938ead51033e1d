#![forbid(unsafe_code)]

//! Engine controller.
//!
//! [`Engine`] owns the marker collection and orchestrates the solvers:
//! a recalculation re-derives items from the [`ItemSource`], rebuilds
//! or reuses marker records, solves rail geometry, reconciles the
//! virtualization window, and re-evaluates the active item. Scroll
//! events run only the window and active passes; hover runs text
//! fitting and annotation placement.
//!
//! Nothing here throws into the host. Empty item listings are retried
//! once after a short delay, store and measurement failures degrade,
//! and a window pass computed against a superseded layout version is
//! silently discarded.

use crate::active::{ActiveConfig, ActiveTracker};
use crate::source::{
    ItemSource, MarkerStore, PIN_KEY_PREFIX, STAR_KEY_PREFIX, parse_flag_key, pin_key, star_key,
};
use crate::surface::{MarkerClass, RenderingSurface};
use railmap_core::{
    Marker, MarkerFlags, MarkerId, RectF, SchedulerConfig, ScrollMetrics, SignalScheduler,
};
use railmap_layout::annotation::{Annotation, Side};
use railmap_layout::rail::{RailGeometry, RailLayout};
use railmap_layout::window::{
    DEFAULT_MIN_BUFFER, LayoutVersion, VisibleRange, WindowDiff,
};
use railmap_text::{FitCacheStats, FitConfig, TextFitter, TextMeasurer};
use rustc_hash::{FxHashMap, FxHashSet};
use std::time::Duration;
use web_time::Instant;

/// Delay before retrying a transiently empty item listing.
pub const EMPTY_RETRY_DELAY: Duration = Duration::from_millis(250);
/// Annotation height used when measurement fails and no height is
/// known.
pub const FALLBACK_ANNOTATION_HEIGHT: f64 = 48.0;

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Rail track geometry.
    pub rail: RailGeometry,
    /// Minimum virtualization buffer around the visible window.
    pub window_min_buffer: f64,
    /// Active-item tracking parameters.
    pub active: ActiveConfig,
    /// Signal lane timings.
    pub scheduler: SchedulerConfig,
    /// Text-fit line budget and cache size.
    pub fit: FitConfig,
    /// Delay before the single transient-empty retry.
    pub empty_retry_delay: Duration,
    /// Preferred annotation expansion side.
    pub annotation_side: Side,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rail: RailGeometry::default(),
            window_min_buffer: DEFAULT_MIN_BUFFER,
            active: ActiveConfig::default(),
            scheduler: SchedulerConfig::default(),
            fit: FitConfig::default(),
            empty_retry_delay: EMPTY_RETRY_DELAY,
            annotation_side: Side::Left,
        }
    }
}

/// A virtualization pass pinned to the layout generation it was
/// computed against. Applying a pass from a superseded generation is a
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPass {
    version: LayoutVersion,
    range: VisibleRange,
}

impl WindowPass {
    /// The window range this pass would apply.
    #[inline]
    pub fn range(&self) -> VisibleRange {
        self.range
    }
}

/// Debug snapshot of the engine state.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSummary {
    /// Number of marker records.
    pub marker_count: usize,
    /// Current virtualization window.
    pub window: VisibleRange,
    /// Current layout generation.
    pub version: u64,
    /// Long-canvas height.
    pub content_height: f64,
    /// Active marker id, if any.
    pub active_id: Option<MarkerId>,
}

/// The minimap engine for one document instance.
///
/// Constructed by whoever embeds it and driven through the explicit
/// `init`/`recalculate`/`destroy` lifecycle; no ambient globals. The
/// host forwards its notifications into `notify_*` and calls
/// [`Engine::tick`] from its frame callback to drain the coalescing
/// lanes.
pub struct Engine<S, R, P, M>
where
    S: ItemSource,
    R: RenderingSurface,
    P: MarkerStore,
    M: TextMeasurer,
{
    source: S,
    surface: R,
    store: P,
    fitter: TextFitter<M>,
    config: EngineConfig,

    markers: Vec<Marker<S::Item, R::Handle>>,
    offsets: Vec<f64>,
    index_by_id: FxHashMap<MarkerId, usize>,
    layout: RailLayout,
    version: LayoutVersion,
    window: VisibleRange,

    tracker: ActiveTracker,
    active_applied: Option<usize>,
    scheduler: SignalScheduler,
    last_metrics: Option<ScrollMetrics>,
    pending_track_height: Option<f64>,
    retry_deadline: Option<Instant>,
    empty_retries: u8,
    annotation_visible: bool,
    initialized: bool,
}

impl<S, R, P, M> Engine<S, R, P, M>
where
    S: ItemSource,
    R: RenderingSurface,
    P: MarkerStore,
    M: TextMeasurer,
{
    /// Create an engine with default configuration.
    pub fn new(source: S, surface: R, store: P, measurer: M) -> Self {
        Self::with_config(source, surface, store, measurer, EngineConfig::default())
    }

    /// Create an engine with explicit configuration.
    pub fn with_config(
        source: S,
        surface: R,
        store: P,
        measurer: M,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            surface,
            store,
            fitter: TextFitter::with_config(measurer, config.fit),
            markers: Vec::new(),
            offsets: Vec::new(),
            index_by_id: FxHashMap::default(),
            // An empty solve sizes the canvas to the bare track, so the
            // rail is never undersized before the first recalculation.
            layout: config.rail.solve(&[]),
            config,
            version: LayoutVersion::default(),
            window: VisibleRange::EMPTY,
            tracker: ActiveTracker::new(config.active),
            active_applied: None,
            scheduler: SignalScheduler::with_config(config.scheduler),
            last_metrics: None,
            pending_track_height: None,
            retry_deadline: None,
            empty_retries: 0,
            annotation_visible: false,
            initialized: false,
        }
    }

    /// Start the engine and run the first recalculation.
    pub fn init(&mut self) {
        self.init_at(Instant::now());
    }

    /// [`Engine::init`] with an explicit clock.
    pub fn init_at(&mut self, now: Instant) {
        self.initialized = true;
        self.recalculate_at(now);
    }

    /// Re-derive everything from the item source.
    pub fn recalculate(&mut self) {
        self.recalculate_at(Instant::now());
    }

    /// [`Engine::recalculate`] with an explicit clock.
    pub fn recalculate_at(&mut self, now: Instant) {
        if !self.initialized {
            return;
        }

        let items = self.source.list_items();
        if items.is_empty() {
            if self.empty_retries == 0 {
                // Mid-navigation panes report zero items transiently;
                // try again shortly before treating it as empty.
                tracing::debug!("item source empty, retrying shortly");
                self.empty_retries = 1;
                self.retry_deadline = Some(now + self.config.empty_retry_delay);
            } else if self.retry_deadline.is_none() {
                // The scheduled retry came back empty too.
                tracing::debug!("item source still empty, clearing markers");
                self.empty_retries = 0;
                self.clear_markers();
                self.solve_geometry(now);
            }
            return;
        }
        self.empty_retries = 0;
        self.retry_deadline = None;

        let mut ids = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            ids.push(self.source.id_of(item, index));
        }

        let reused = ids.len() == self.markers.len()
            && ids.iter().zip(&self.markers).all(|(id, m)| *id == m.id);
        if reused {
            // Content-internal re-renders keep the same item set;
            // refresh the handles and skip the rebuild.
            for (marker, item) in self.markers.iter_mut().zip(items) {
                marker.item = item;
            }
            tracing::trace!(count = self.markers.len(), "marker records reused");
        } else {
            self.rebuild_markers(items, ids);
        }

        self.refresh_offsets(reused);
        self.solve_geometry(now);
    }

    /// Tear the engine down: cancel pending work, release every render
    /// handle, and discard all markers.
    pub fn destroy(&mut self) {
        self.scheduler.clear();
        self.retry_deadline = None;
        self.empty_retries = 0;
        self.pending_track_height = None;
        self.hide_annotation();
        self.clear_markers();
        self.layout = RailLayout::default();
        self.last_metrics = None;
        self.initialized = false;
    }

    /// Id of the currently active marker.
    pub fn active_id(&self) -> Option<&MarkerId> {
        self.tracker
            .active()
            .and_then(|index| self.markers.get(index))
            .map(|marker| &marker.id)
    }

    /// Flags of a marker, if it exists.
    pub fn marker_flags(&self, id: &MarkerId) -> Option<MarkerFlags> {
        let index = *self.index_by_id.get(id)?;
        self.markers.get(index).map(|m| m.flags)
    }

    /// Scroll the content pane to a marker's item and activate it.
    ///
    /// Returns `false` when the id is unknown.
    pub fn scroll_to_marker(&mut self, id: &MarkerId) -> bool {
        self.scroll_to_marker_at(id, Instant::now())
    }

    /// [`Engine::scroll_to_marker`] with an explicit clock.
    pub fn scroll_to_marker_at(&mut self, id: &MarkerId, now: Instant) -> bool {
        let Some(&index) = self.index_by_id.get(id) else {
            return false;
        };
        let Some(&offset) = self.offsets.get(index) else {
            return false;
        };
        self.surface.scroll_content_to(offset);
        self.tracker.set_active_at(index, now);
        self.sync_active_class();
        true
    }

    /// Toggle a marker's starred flag. Returns the new state, or
    /// `None` for an unknown id.
    pub fn toggle_star(&mut self, id: &MarkerId) -> Option<bool> {
        self.toggle_flag(id, MarkerFlags::STARRED, MarkerClass::Starred)
    }

    /// Toggle a marker's pinned flag. Returns the new state, or `None`
    /// for an unknown id.
    pub fn toggle_pin(&mut self, id: &MarkerId) -> Option<bool> {
        self.toggle_flag(id, MarkerFlags::PINNED, MarkerClass::Pinned)
    }

    /// Apply an externally observed store change (the persistence
    /// collaborator's change subscription).
    ///
    /// The key's current value is re-read through the store; a failed
    /// read leaves the flag unset.
    pub fn note_store_change(&mut self, key: &str) {
        let Some((prefix, id)) = parse_flag_key(key) else {
            return;
        };
        let present = match self.store.get(key) {
            Ok(value) => value.is_some(),
            Err(err) => {
                tracing::warn!(%err, key, "flag lookup failed");
                false
            }
        };
        let (flag, class) = if prefix == PIN_KEY_PREFIX {
            (MarkerFlags::PINNED, MarkerClass::Pinned)
        } else {
            (MarkerFlags::STARRED, MarkerClass::Starred)
        };
        let Some(&index) = self.index_by_id.get(&id) else {
            return;
        };
        let Some(marker) = self.markers.get_mut(index) else {
            return;
        };
        if marker.set_flag(flag, present) {
            if let Some(handle) = marker.render.as_mut() {
                self.surface.set_class(handle, class, present);
            }
        }
    }

    /// Show the floating annotation for an anchor.
    ///
    /// Chooses side and width tier, fits the text into the line
    /// budget, places the box, and hands it to the surface. Returns
    /// `false` when the annotation cannot be placed (degenerate
    /// viewport); other failures degrade to best-effort sizing.
    pub fn show_annotation_for(&mut self, anchor: RectF, text: &str, viewport: RectF) -> bool {
        let annotation =
            Annotation::new(anchor, self.config.annotation_side);
        let (side, width) = annotation.choose_width(viewport);
        let fit = self.fitter.fit(text, width, true);
        let height = if fit.height > 0.0 {
            fit.height
        } else {
            FALLBACK_ANNOTATION_HEIGHT
        };
        let Some(area) = annotation.place(viewport, side, width, height) else {
            return false;
        };
        self.surface.show_annotation(&area, &fit.text);
        self.annotation_visible = true;
        true
    }

    /// Hide the floating annotation.
    pub fn hide_annotation(&mut self) {
        if self.annotation_visible {
            self.surface.hide_annotation();
            self.annotation_visible = false;
        }
    }

    /// Invalidate memoized text measurements (visual-theme change).
    pub fn note_theme_changed(&mut self) {
        self.fitter.invalidate();
    }

    /// Record a structural-change notification (debounced).
    pub fn notify_structural_change(&mut self) {
        self.notify_structural_change_at(Instant::now());
    }

    /// [`Engine::notify_structural_change`] with an explicit clock.
    pub fn notify_structural_change_at(&mut self, now: Instant) {
        if self.initialized {
            self.scheduler.note_structural_at(now);
        }
    }

    /// Record a resize notification with the new track height
    /// (debounced, with an idle settle pass).
    pub fn notify_resize(&mut self, track_height: f64) {
        self.notify_resize_at(track_height, Instant::now());
    }

    /// [`Engine::notify_resize`] with an explicit clock.
    pub fn notify_resize_at(&mut self, track_height: f64, now: Instant) {
        if self.initialized {
            self.pending_track_height = Some(track_height);
            self.scheduler.note_resize_at(now);
        }
    }

    /// Record a scroll notification (coalesced to one pass per tick).
    ///
    /// Returns `true` when this armed the frame guard; `false` when an
    /// earlier scroll is already pending and only the metrics were
    /// refreshed.
    pub fn notify_scroll(&mut self, metrics: ScrollMetrics) -> bool {
        if !self.initialized {
            return false;
        }
        self.scheduler.note_scroll(metrics)
    }

    /// Drain due work. Hosts call this from their frame callback.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// [`Engine::tick`] with an explicit clock.
    pub fn tick_at(&mut self, now: Instant) {
        if !self.initialized {
            return;
        }

        if self.retry_deadline.is_some_and(|d| d <= now) {
            self.retry_deadline = None;
            self.recalculate_at(now);
        }

        let due = self.scheduler.poll_at(now);
        if due.structural {
            self.recalculate_at(now);
        }
        if due.resize {
            if let Some(track_height) = self.pending_track_height.take() {
                self.config.rail.track_height = track_height;
            }
            self.solve_geometry(now);
        }
        if due.resize_settle {
            // Settle correction: content may have reflowed during the
            // resize, so re-read offsets before solving again.
            self.refresh_offsets(true);
            self.solve_geometry(now);
        }
        if let Some(metrics) = due.scroll {
            self.apply_scroll_at(metrics, now);
        }

        if self.tracker.poll_at(now).is_some() {
            self.sync_active_class();
        }
    }

    /// Compute a virtualization pass for a long-canvas scroll offset,
    /// pinned to the current layout generation.
    pub fn compute_window_pass(&self, rail_scroll: f64) -> WindowPass {
        WindowPass {
            version: self.version,
            range: VisibleRange::compute(
                &self.layout.y_positions,
                rail_scroll,
                self.config.rail.track_height,
                self.config.window_min_buffer,
            ),
        }
    }

    /// Apply a virtualization pass, unless its layout generation has
    /// been superseded.
    pub fn apply_window_pass(&mut self, pass: WindowPass) {
        if pass.version != self.version {
            tracing::debug!(
                pass = pass.version.get(),
                current = self.version.get(),
                "stale window pass discarded"
            );
            return;
        }

        let diff = WindowDiff::between(self.window, pass.range);
        if diff.rebuild {
            // Nothing trustworthy was rendered: clear, then build.
            self.clear_render_handles();
        } else {
            for &index in &diff.exited {
                if let Some(marker) = self.markers.get_mut(index) {
                    if let Some(handle) = marker.render.take() {
                        self.surface.release_marker(handle);
                    }
                }
            }
        }
        for &index in &diff.entered {
            self.mount_marker(index);
        }
        for &index in &diff.retained {
            let Some((&n, &y)) = self
                .layout
                .n
                .get(index)
                .zip(self.layout.y_positions.get(index))
            else {
                continue;
            };
            if let Some(marker) = self.markers.get_mut(index) {
                if let Some(handle) = marker.render.as_mut() {
                    self.surface.update_marker(handle, n, y);
                }
            }
        }
        self.window = pass.range;
    }

    /// Debug snapshot.
    pub fn summary(&self) -> EngineSummary {
        EngineSummary {
            marker_count: self.markers.len(),
            window: self.window,
            version: self.version.get(),
            content_height: self.layout.content_height,
            active_id: self.active_id().cloned(),
        }
    }

    /// Solved rail layout (primarily for host debug overlays).
    pub fn layout(&self) -> &RailLayout {
        &self.layout
    }

    /// Text-fit cache counters.
    pub fn fit_stats(&self) -> FitCacheStats {
        self.fitter.stats()
    }

    fn rebuild_markers(&mut self, items: Vec<S::Item>, ids: Vec<MarkerId>) {
        self.clear_render_handles();
        self.hide_annotation();
        self.markers.clear();
        self.index_by_id.clear();
        self.window = VisibleRange::EMPTY;
        self.tracker.reset();
        self.active_applied = None;

        let (starred, pinned) = self.load_flag_sets();
        for ((index, item), id) in items.into_iter().enumerate().zip(ids) {
            let summary = self.source.summary_of(&item);
            let mut marker = Marker::new(id.clone(), item, summary);
            marker
                .flags
                .set(MarkerFlags::STARRED, starred.contains(id.as_str()));
            marker
                .flags
                .set(MarkerFlags::PINNED, pinned.contains(id.as_str()));
            self.index_by_id.insert(id, index);
            self.markers.push(marker);
        }
        tracing::debug!(count = self.markers.len(), "markers rebuilt");
    }

    fn clear_markers(&mut self) {
        self.clear_render_handles();
        self.markers.clear();
        self.offsets.clear();
        self.index_by_id.clear();
        self.window = VisibleRange::EMPTY;
        self.tracker.reset();
        self.active_applied = None;
    }

    fn clear_render_handles(&mut self) {
        for marker in &mut self.markers {
            if let Some(handle) = marker.render.take() {
                self.surface.release_marker(handle);
            }
        }
    }

    /// Persisted flag ids, one prefix scan per flag. A failed scan
    /// leaves that flag unset everywhere.
    fn load_flag_sets(&self) -> (FxHashSet<String>, FxHashSet<String>) {
        let scan = |prefix: &str| match self.store.keys_with_prefix(prefix) {
            Ok(keys) => keys
                .iter()
                .filter_map(|key| key.strip_prefix(prefix))
                .map(str::to_owned)
                .collect(),
            Err(err) => {
                tracing::warn!(%err, prefix, "flag scan failed");
                FxHashSet::default()
            }
        };
        (scan(STAR_KEY_PREFIX), scan(PIN_KEY_PREFIX))
    }

    fn refresh_offsets(&mut self, reused: bool) {
        let mut offsets = Vec::with_capacity(self.markers.len());
        let mut prev = 0.0;
        for (index, marker) in self.markers.iter().enumerate() {
            let offset = match self.source.offset_of(&marker.item) {
                Some(value) if value.is_finite() => value,
                // The item's element went missing mid-pass: keep the
                // last known offset so the remaining markers are
                // unaffected.
                _ => {
                    if reused {
                        self.offsets.get(index).copied().unwrap_or(prev)
                    } else {
                        prev
                    }
                }
            };
            prev = offset;
            offsets.push(offset);
        }
        self.offsets = offsets;
    }

    fn solve_geometry(&mut self, now: Instant) {
        self.layout = self.config.rail.solve(&self.offsets);
        self.version.bump();
        let corrected = self.layout.base_n.iter().zip(&self.layout.n);
        for (marker, (&base_n, &n)) in self.markers.iter_mut().zip(corrected) {
            marker.base_n = base_n;
            marker.n = n;
        }
        self.surface.set_canvas_height(self.layout.content_height);

        match self.last_metrics {
            Some(metrics) => self.apply_scroll_at(metrics, now),
            None => {
                // No scroll seen yet: render the window at the canvas
                // origin so the rail is populated from the start.
                let pass = self.compute_window_pass(0.0);
                self.apply_window_pass(pass);
            }
        }
    }

    fn apply_scroll_at(&mut self, metrics: ScrollMetrics, now: Instant) {
        self.last_metrics = Some(metrics);

        // Keep the long canvas in lock-step with the content pane.
        let rail_scroll = metrics.fraction()
            * (self.layout.content_height - self.config.rail.track_height).max(0.0);
        self.surface.set_rail_scroll(rail_scroll);

        let pass = self.compute_window_pass(rail_scroll);
        self.apply_window_pass(pass);

        self.tracker.observe_at(&self.offsets, metrics, now);
        self.sync_active_class();
    }

    fn mount_marker(&mut self, index: usize) {
        let Some((&n, &y)) = self
            .layout
            .n
            .get(index)
            .zip(self.layout.y_positions.get(index))
        else {
            return;
        };
        let Some(marker) = self.markers.get_mut(index) else {
            return;
        };
        // A missing anchor aborts this marker only; the rest of the
        // pass continues.
        let Some(mut handle) = self.surface.create_marker(&marker.id, n, y) else {
            return;
        };
        if marker.flags.contains(MarkerFlags::STARRED) {
            self.surface.set_class(&mut handle, MarkerClass::Starred, true);
        }
        if marker.flags.contains(MarkerFlags::PINNED) {
            self.surface.set_class(&mut handle, MarkerClass::Pinned, true);
        }
        if self.active_applied == Some(index) {
            self.surface.set_class(&mut handle, MarkerClass::Active, true);
        }
        marker.render = Some(handle);
    }

    fn sync_active_class(&mut self) {
        let current = self.tracker.active();
        if current == self.active_applied {
            return;
        }
        if let Some(previous) = self.active_applied {
            if let Some(marker) = self.markers.get_mut(previous) {
                if let Some(handle) = marker.render.as_mut() {
                    self.surface.set_class(handle, MarkerClass::Active, false);
                }
            }
        }
        if let Some(next) = current {
            if let Some(marker) = self.markers.get_mut(next) {
                if let Some(handle) = marker.render.as_mut() {
                    self.surface.set_class(handle, MarkerClass::Active, true);
                }
            }
        }
        self.active_applied = current;
    }

    fn toggle_flag(
        &mut self,
        id: &MarkerId,
        flag: MarkerFlags,
        class: MarkerClass,
    ) -> Option<bool> {
        let &index = self.index_by_id.get(id)?;
        let marker = self.markers.get_mut(index)?;
        let on = !marker.flags.contains(flag);
        marker.set_flag(flag, on);

        let key = if flag == MarkerFlags::PINNED {
            pin_key(id)
        } else {
            star_key(id)
        };
        let result = if on {
            self.store.set(&key, "1")
        } else {
            self.store.remove(&key)
        };
        if let Err(err) = result {
            // Flags are cosmetic; persistence failures only cost
            // durability.
            tracing::warn!(%err, %id, "flag persistence failed");
        }

        if let Some(marker) = self.markers.get_mut(index) {
            if let Some(handle) = marker.render.as_mut() {
                self.surface.set_class(handle, class, on);
            }
        }
        Some(on)
    }
}
