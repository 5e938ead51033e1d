//! End-to-end engine tests against mock collaborators.
//!
//! These drive the public lifecycle the way a host would: wire the
//! collaborator seams, init, push notifications, tick from a simulated
//! frame clock, and assert on what reached the rendering surface.

use railmap_core::{MarkerFlags, MarkerId, RectF, ScrollMetrics};
use railmap_engine::active::MIN_CHANGE_INTERVAL;
use railmap_engine::controller::{Engine, EngineConfig};
use railmap_engine::source::{ItemSource, MarkerStore, StoreError, star_key};
use railmap_engine::surface::{MarkerClass, RenderingSurface};
use railmap_layout::annotation::AnnotationArea;
use railmap_layout::rail::RailGeometry;
use railmap_text::{MeasureError, TextMeasurer, TextMetrics};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;
use web_time::Instant;

// --- Mock collaborators ----------------------------------------------------

#[derive(Debug, Clone)]
struct MockItem {
    id: String,
    summary: String,
    offset: f64,
}

fn item(id: &str, offset: f64) -> MockItem {
    MockItem {
        id: id.to_owned(),
        summary: format!("summary of {id}"),
        offset,
    }
}

#[derive(Clone, Default)]
struct MockSource {
    items: Rc<RefCell<Vec<MockItem>>>,
    listings: Rc<RefCell<usize>>,
}

impl MockSource {
    fn with_items(items: Vec<MockItem>) -> Self {
        Self {
            items: Rc::new(RefCell::new(items)),
            listings: Rc::default(),
        }
    }

    fn set_items(&self, items: Vec<MockItem>) {
        *self.items.borrow_mut() = items;
    }

    fn listings(&self) -> usize {
        *self.listings.borrow()
    }
}

impl ItemSource for MockSource {
    type Item = MockItem;

    fn list_items(&self) -> Vec<MockItem> {
        *self.listings.borrow_mut() += 1;
        self.items.borrow().clone()
    }

    fn id_of(&self, item: &MockItem, _index: usize) -> MarkerId {
        MarkerId::new(item.id.clone())
    }

    fn summary_of(&self, item: &MockItem) -> String {
        item.summary.clone()
    }

    fn offset_of(&self, item: &MockItem) -> Option<f64> {
        Some(item.offset)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Classes {
    active: bool,
    starred: bool,
    pinned: bool,
}

#[derive(Default)]
struct SurfaceState {
    next_handle: u64,
    live: BTreeMap<u64, (String, f64, f64)>,
    classes: BTreeMap<u64, Classes>,
    created: usize,
    released: usize,
    updated: usize,
    canvas_height: f64,
    rail_scroll: f64,
    content_scrolls: Vec<f64>,
    annotation: Option<(AnnotationArea, String)>,
    hides: usize,
}

impl SurfaceState {
    fn classes_of(&self, marker_id: &str) -> Option<Classes> {
        self.live
            .iter()
            .find(|(_, (id, _, _))| id == marker_id)
            .and_then(|(handle, _)| self.classes.get(handle).copied())
    }

    fn active_markers(&self) -> Vec<String> {
        self.live
            .iter()
            .filter(|(handle, _)| self.classes.get(handle).is_some_and(|c| c.active))
            .map(|(_, (id, _, _))| id.clone())
            .collect()
    }
}

#[derive(Clone, Default)]
struct MockSurface {
    state: Rc<RefCell<SurfaceState>>,
}

impl RenderingSurface for MockSurface {
    type Handle = u64;

    fn create_marker(&mut self, id: &MarkerId, n: f64, y: f64) -> Option<u64> {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.live.insert(handle, (id.to_string(), n, y));
        state.classes.insert(handle, Classes::default());
        state.created += 1;
        Some(handle)
    }

    fn update_marker(&mut self, handle: &mut u64, n: f64, y: f64) {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.live.get_mut(handle) {
            entry.1 = n;
            entry.2 = y;
        }
        state.updated += 1;
    }

    fn release_marker(&mut self, handle: u64) {
        let mut state = self.state.borrow_mut();
        state.live.remove(&handle);
        state.classes.remove(&handle);
        state.released += 1;
    }

    fn set_class(&mut self, handle: &mut u64, class: MarkerClass, on: bool) {
        let mut state = self.state.borrow_mut();
        if let Some(classes) = state.classes.get_mut(handle) {
            match class {
                MarkerClass::Active => classes.active = on,
                MarkerClass::Starred => classes.starred = on,
                MarkerClass::Pinned => classes.pinned = on,
            }
        }
    }

    fn set_canvas_height(&mut self, height: f64) {
        self.state.borrow_mut().canvas_height = height;
    }

    fn set_rail_scroll(&mut self, offset: f64) {
        self.state.borrow_mut().rail_scroll = offset;
    }

    fn scroll_content_to(&mut self, offset: f64) {
        self.state.borrow_mut().content_scrolls.push(offset);
    }

    fn show_annotation(&mut self, area: &AnnotationArea, text: &str) {
        self.state.borrow_mut().annotation = Some((*area, text.to_owned()));
    }

    fn hide_annotation(&mut self) {
        let mut state = self.state.borrow_mut();
        state.annotation = None;
        state.hides += 1;
    }
}

#[derive(Clone, Default)]
struct MemoryStore {
    map: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MarkerStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.map.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.map.borrow_mut().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.map.borrow_mut().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .map
            .borrow()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Store whose every operation fails.
#[derive(Clone, Copy, Default)]
struct BrokenStore;

impl MarkerStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("broken".into()))
    }

    fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable)
    }
}

/// Character-grid measurer: 8px per character, 16px per line.
#[derive(Debug, Clone, Copy, Default)]
struct GridMeasurer {
    fail: bool,
}

impl TextMeasurer for GridMeasurer {
    fn measure(
        &mut self,
        text: &str,
        width: f64,
        _with_layout: bool,
    ) -> Result<TextMetrics, MeasureError> {
        if self.fail {
            return Err(MeasureError::Unavailable);
        }
        let per_line = ((width / 8.0).floor() as usize).max(1);
        let lines = text.chars().count().div_ceil(per_line).max(1);
        Ok(TextMetrics {
            height: lines as f64 * 16.0,
            line_height: 16.0,
        })
    }
}

// --- Harness ---------------------------------------------------------------

type TestEngine<P = MemoryStore> = Engine<MockSource, MockSurface, P, GridMeasurer>;

fn test_config() -> EngineConfig {
    EngineConfig {
        rail: RailGeometry::new(500.0).padding(20.0).min_gap(40.0),
        ..EngineConfig::default()
    }
}

fn engine_with(items: Vec<MockItem>) -> (TestEngine, MockSource, MockSurface) {
    let source = MockSource::with_items(items);
    let surface = MockSurface::default();
    let engine = Engine::with_config(
        source.clone(),
        surface.clone(),
        MemoryStore::default(),
        GridMeasurer::default(),
        test_config(),
    );
    (engine, source, surface)
}

fn metrics(scroll_top: f64) -> ScrollMetrics {
    ScrollMetrics::new(scroll_top, 500.0, 2000.0)
}

// --- Lifecycle -------------------------------------------------------------

#[test]
fn init_builds_markers_and_canvas() {
    let (mut engine, _source, surface) =
        engine_with(vec![item("a", 0.0), item("b", 100.0), item("c", 1000.0)]);
    engine.init_at(Instant::now());

    let summary = engine.summary();
    assert_eq!(summary.marker_count, 3);
    assert_eq!(summary.content_height, 500.0);

    let state = surface.state.borrow();
    assert_eq!(state.canvas_height, 500.0);
    assert_eq!(state.live.len(), 3, "small sets render entirely");

    // Clustered offsets: the first two markers keep the 40px gap, the
    // last sits at the terminal position.
    let layout = engine.layout();
    assert!(layout.y_positions[1] - layout.y_positions[0] >= 40.0);
    assert_eq!(layout.y_positions[2], 480.0);
}

#[test]
fn destroy_releases_everything_and_goes_quiet() {
    let (mut engine, source, surface) =
        engine_with(vec![item("a", 0.0), item("b", 500.0), item("c", 1500.0)]);
    let t0 = Instant::now();
    engine.init_at(t0);
    engine.notify_scroll(metrics(300.0));
    engine.tick_at(t0 + Duration::from_millis(16));

    engine.destroy();
    {
        let state = surface.state.borrow();
        assert!(state.live.is_empty(), "all render handles released");
    }
    assert_eq!(engine.summary().marker_count, 0);
    assert_eq!(engine.active_id(), None);

    // A destroyed engine ignores notifications.
    let listings = source.listings();
    engine.notify_structural_change_at(t0 + Duration::from_secs(1));
    engine.tick_at(t0 + Duration::from_secs(2));
    assert_eq!(source.listings(), listings);
}

#[test]
fn unchanged_item_set_reuses_records() {
    let (mut engine, _source, surface) =
        engine_with(vec![item("a", 0.0), item("b", 400.0)]);
    let t0 = Instant::now();
    engine.init_at(t0);
    let created_after_init = surface.state.borrow().created;

    // Content-internal re-render: same ids, same offsets.
    engine.recalculate_at(t0 + Duration::from_millis(500));
    let state = surface.state.borrow();
    assert_eq!(
        state.created, created_after_init,
        "no markers recreated when the id set is unchanged"
    );
    assert_eq!(state.live.len(), 2);
}

#[test]
fn changed_item_set_rebuilds_markers() {
    let (mut engine, source, surface) =
        engine_with(vec![item("a", 0.0), item("b", 400.0)]);
    let t0 = Instant::now();
    engine.init_at(t0);

    source.set_items(vec![item("a", 0.0), item("b", 400.0), item("c", 900.0)]);
    engine.recalculate_at(t0 + Duration::from_millis(500));

    assert_eq!(engine.summary().marker_count, 3);
    let state = surface.state.borrow();
    assert_eq!(state.live.len(), 3);
}

// --- Transient empty -------------------------------------------------------

#[test]
fn empty_listing_retries_once_then_succeeds() {
    let (mut engine, source, surface) = engine_with(Vec::new());
    let t0 = Instant::now();
    engine.init_at(t0);
    assert_eq!(engine.summary().marker_count, 0);

    // Items appear before the retry fires (mid-navigation settled).
    source.set_items(vec![item("a", 0.0), item("b", 300.0)]);
    engine.tick_at(t0 + Duration::from_millis(100));
    assert_eq!(engine.summary().marker_count, 0, "retry not due yet");

    engine.tick_at(t0 + Duration::from_millis(260));
    assert_eq!(engine.summary().marker_count, 2);
    assert_eq!(surface.state.borrow().live.len(), 2);
}

#[test]
fn empty_listing_gives_up_after_one_retry() {
    let (mut engine, source, _surface) = engine_with(Vec::new());
    let t0 = Instant::now();
    engine.init_at(t0);
    engine.tick_at(t0 + Duration::from_millis(260));
    let listings = source.listings();

    // No further retries are scheduled.
    engine.tick_at(t0 + Duration::from_secs(10));
    assert_eq!(source.listings(), listings);
    assert_eq!(engine.summary().marker_count, 0);
}

// --- Debounce and coalescing -----------------------------------------------

#[test]
fn structural_notifications_debounce_into_one_recalc() {
    let (mut engine, source, _surface) =
        engine_with(vec![item("a", 0.0), item("b", 300.0)]);
    let t0 = Instant::now();
    engine.init_at(t0);
    let listings = source.listings();

    // A burst of mutations.
    for ms in [0u64, 30, 60, 90] {
        engine.notify_structural_change_at(t0 + Duration::from_millis(ms));
        engine.tick_at(t0 + Duration::from_millis(ms + 1));
    }
    assert_eq!(source.listings(), listings, "debounce window still open");

    engine.tick_at(t0 + Duration::from_millis(90 + 200));
    assert_eq!(source.listings(), listings + 1, "single coalesced recalc");
}

#[test]
fn scroll_notifications_coalesce_per_tick() {
    let (mut engine, _source, surface) =
        engine_with(vec![item("a", 0.0), item("b", 500.0), item("c", 1500.0)]);
    let t0 = Instant::now();
    engine.init_at(t0);

    assert!(engine.notify_scroll(metrics(100.0)));
    assert!(!engine.notify_scroll(metrics(200.0)), "frame guard armed");
    assert!(!engine.notify_scroll(metrics(300.0)));

    engine.tick_at(t0 + Duration::from_millis(16));
    // Only the latest metrics were applied.
    let expected = metrics(300.0).fraction() * (engine.layout().content_height - 500.0).max(0.0);
    assert_eq!(surface.state.borrow().rail_scroll, expected);

    // Guard released: the next scroll arms it again.
    assert!(engine.notify_scroll(metrics(400.0)));
}

#[test]
fn resize_updates_track_height_after_debounce() {
    let (mut engine, _source, _surface) =
        engine_with(vec![item("a", 0.0), item("b", 300.0)]);
    let t0 = Instant::now();
    engine.init_at(t0);
    assert_eq!(engine.summary().content_height, 500.0);

    engine.notify_resize_at(800.0, t0);
    engine.tick_at(t0 + Duration::from_millis(10));
    assert_eq!(engine.summary().content_height, 500.0, "debounce open");

    engine.tick_at(t0 + Duration::from_millis(160));
    assert_eq!(engine.summary().content_height, 800.0);
}

// --- Virtualization --------------------------------------------------------

#[test]
fn thousands_of_items_render_a_window_only() {
    let items: Vec<MockItem> = (0..3000)
        .map(|i| item(&format!("t{i}"), i as f64 * 100.0))
        .collect();
    let source = MockSource::with_items(items);
    let surface = MockSurface::default();
    let config = EngineConfig {
        rail: RailGeometry::new(600.0).padding(20.0).min_gap(10.0),
        ..EngineConfig::default()
    };
    let mut engine = Engine::with_config(
        source,
        surface.clone(),
        MemoryStore::default(),
        GridMeasurer::default(),
        config,
    );
    let t0 = Instant::now();
    engine.init_at(t0);

    let live = surface.state.borrow().live.len();
    assert!(live > 0);
    assert!(live < 300, "only a windowful of 3000 markers is live");

    // Scrolling far moves the window without inflating the live set.
    engine.notify_scroll(ScrollMetrics::new(150_000.0, 600.0, 300_000.0));
    engine.tick_at(t0 + Duration::from_millis(16));
    let state = surface.state.borrow();
    assert!(state.live.len() < 300);
    assert!(state.released > 0, "markers leaving the window are released");
}

#[test]
fn window_moves_with_scroll_and_positions_update() {
    let items: Vec<MockItem> = (0..200)
        .map(|i| item(&format!("t{i}"), i as f64 * 100.0))
        .collect();
    let (mut engine, _source, surface) = engine_with(items);
    let t0 = Instant::now();
    engine.init_at(t0);

    engine.notify_scroll(ScrollMetrics::new(0.0, 500.0, 20_000.0));
    engine.tick_at(t0 + Duration::from_millis(16));
    let first_window = engine.summary().window;

    engine.notify_scroll(ScrollMetrics::new(10_000.0, 500.0, 20_000.0));
    engine.tick_at(t0 + Duration::from_millis(32));
    let second_window = engine.summary().window;

    assert!(second_window.start > first_window.start, "window advanced");
    let state = surface.state.borrow();
    assert!(state.updated > 0, "retained markers got position updates");
}

#[test]
fn stale_window_pass_is_discarded() {
    let (mut engine, source, surface) =
        engine_with(vec![item("a", 0.0), item("b", 400.0)]);
    let t0 = Instant::now();
    engine.init_at(t0);

    // Compute a pass, then supersede the layout before applying it.
    let pass = engine.compute_window_pass(0.0);
    source.set_items(vec![item("x", 0.0), item("y", 200.0), item("z", 900.0)]);
    engine.recalculate_at(t0 + Duration::from_millis(100));

    let created_before = surface.state.borrow().created;
    let window_before = engine.summary().window;
    engine.apply_window_pass(pass);
    assert_eq!(surface.state.borrow().created, created_before);
    assert_eq!(engine.summary().window, window_before, "stale pass ignored");
}

// --- Active tracking -------------------------------------------------------

#[test]
fn boundary_scrolls_activate_first_and_last() {
    for n in 1..=5usize {
        let items: Vec<MockItem> = (0..n)
            .map(|i| item(&format!("t{i}"), i as f64 * 400.0))
            .collect();
        let (mut engine, _source, _surface) = engine_with(items);
        let t0 = Instant::now();
        engine.init_at(t0);

        engine.notify_scroll(metrics(0.0));
        engine.tick_at(t0 + Duration::from_millis(16));
        assert_eq!(
            engine.active_id().map(MarkerId::as_str),
            Some("t0"),
            "top of content activates the first item (n={n})"
        );

        // Past the rate gate, scroll to the very bottom.
        let t1 = t0 + MIN_CHANGE_INTERVAL + Duration::from_millis(16);
        engine.notify_scroll(metrics(1500.0));
        engine.tick_at(t1);
        let last = format!("t{}", n - 1);
        assert_eq!(
            engine.active_id().map(MarkerId::as_str),
            Some(last.as_str()),
            "bottom of content activates the last item (n={n})"
        );
    }
}

#[test]
fn active_class_follows_the_active_marker() {
    let (mut engine, _source, surface) =
        engine_with(vec![item("a", 0.0), item("b", 500.0), item("c", 1500.0)]);
    let t0 = Instant::now();
    engine.init_at(t0);

    engine.notify_scroll(metrics(0.0));
    engine.tick_at(t0 + Duration::from_millis(16));
    assert_eq!(surface.state.borrow().active_markers(), vec!["a".to_owned()]);

    let t1 = t0 + MIN_CHANGE_INTERVAL + Duration::from_millis(16);
    engine.notify_scroll(metrics(1500.0));
    engine.tick_at(t1);
    assert_eq!(surface.state.borrow().active_markers(), vec!["c".to_owned()]);
}

#[test]
fn rapid_active_changes_apply_once_with_latest() {
    let (mut engine, _source, surface) =
        engine_with(vec![item("a", 0.0), item("b", 600.0), item("c", 1200.0)]);
    let t0 = Instant::now();
    engine.init_at(t0);

    engine.notify_scroll(metrics(0.0));
    engine.tick_at(t0 + Duration::from_millis(16));
    assert_eq!(engine.active_id().map(MarkerId::as_str), Some("a"));

    // Two qualifying changes inside the minimum interval.
    engine.notify_scroll(metrics(700.0));
    engine.tick_at(t0 + Duration::from_millis(60));
    engine.notify_scroll(metrics(1500.0));
    engine.tick_at(t0 + Duration::from_millis(120));
    assert_eq!(
        engine.active_id().map(MarkerId::as_str),
        Some("a"),
        "changes deferred inside the interval"
    );

    // The deferred poll applies exactly the latest candidate.
    engine.tick_at(t0 + Duration::from_millis(16) + MIN_CHANGE_INTERVAL);
    assert_eq!(engine.active_id().map(MarkerId::as_str), Some("c"));
    assert_eq!(surface.state.borrow().active_markers(), vec!["c".to_owned()]);
}

#[test]
fn scroll_to_marker_jumps_and_activates() {
    let (mut engine, _source, surface) =
        engine_with(vec![item("a", 0.0), item("b", 500.0), item("c", 1500.0)]);
    let t0 = Instant::now();
    engine.init_at(t0);

    let id = MarkerId::new("b");
    assert!(engine.scroll_to_marker_at(&id, t0));
    assert_eq!(surface.state.borrow().content_scrolls, vec![500.0]);
    assert_eq!(engine.active_id(), Some(&id));

    assert!(!engine.scroll_to_marker_at(&MarkerId::new("nope"), t0));
}

// --- Flags and persistence -------------------------------------------------

#[test]
fn toggled_flags_persist_across_rebuilds() {
    let store = MemoryStore::default();
    let source = MockSource::with_items(vec![item("a", 0.0), item("b", 400.0)]);
    let surface = MockSurface::default();
    let mut engine = Engine::with_config(
        source.clone(),
        surface.clone(),
        store.clone(),
        GridMeasurer::default(),
        test_config(),
    );
    let t0 = Instant::now();
    engine.init_at(t0);

    let id = MarkerId::new("a");
    assert_eq!(engine.toggle_star(&id), Some(true));
    assert_eq!(engine.toggle_pin(&id), Some(true));
    assert!(store.map.borrow().contains_key(&star_key(&id)));
    assert_eq!(surface.state.borrow().classes_of("a").unwrap().starred, true);

    // A new engine over the same store sees the flags on rebuild.
    let mut second = Engine::with_config(
        source,
        MockSurface::default(),
        store.clone(),
        GridMeasurer::default(),
        test_config(),
    );
    second.init_at(t0 + Duration::from_secs(1));
    assert_eq!(
        second.marker_flags(&id),
        Some(MarkerFlags::STARRED | MarkerFlags::PINNED)
    );

    // Untoggling removes the persisted key.
    assert_eq!(second.toggle_star(&id), Some(false));
    assert!(!store.map.borrow().contains_key(&star_key(&id)));
}

#[test]
fn broken_store_is_swallowed() {
    let source = MockSource::with_items(vec![item("a", 0.0), item("b", 400.0)]);
    let surface = MockSurface::default();
    let mut engine = Engine::with_config(
        source,
        surface.clone(),
        BrokenStore,
        GridMeasurer::default(),
        test_config(),
    );
    engine.init_at(Instant::now());

    let id = MarkerId::new("a");
    assert_eq!(engine.summary().marker_count, 2);
    // The toggle still flips in memory and on the surface.
    assert_eq!(engine.toggle_star(&id), Some(true));
    assert_eq!(engine.marker_flags(&id), Some(MarkerFlags::STARRED));
    assert_eq!(surface.state.borrow().classes_of("a").unwrap().starred, true);
}

#[test]
fn store_change_subscription_updates_classes() {
    let store = MemoryStore::default();
    let source = MockSource::with_items(vec![item("a", 0.0), item("b", 400.0)]);
    let surface = MockSurface::default();
    let mut engine = Engine::with_config(
        source,
        surface.clone(),
        store.clone(),
        GridMeasurer::default(),
        test_config(),
    );
    engine.init_at(Instant::now());

    // Another tab pinned item b; the subscription re-reads the key.
    store.map.borrow_mut().insert("pin:b".to_owned(), "1".to_owned());
    engine.note_store_change("pin:b");
    assert_eq!(
        engine.marker_flags(&MarkerId::new("b")),
        Some(MarkerFlags::PINNED)
    );
    assert_eq!(surface.state.borrow().classes_of("b").unwrap().pinned, true);

    store.map.borrow_mut().remove("pin:b");
    engine.note_store_change("pin:b");
    assert_eq!(
        engine.marker_flags(&MarkerId::new("b")),
        Some(MarkerFlags::empty())
    );
    // Unrelated keys are ignored.
    engine.note_store_change("theme:dark");
}

// --- Annotations -----------------------------------------------------------

#[test]
fn annotation_fits_places_and_hides() {
    let (mut engine, _source, surface) =
        engine_with(vec![item("a", 0.0), item("b", 400.0)]);
    engine.init_at(Instant::now());

    let viewport = RectF::from_size(1000.0, 700.0);
    let anchor = RectF::new(10.0, 300.0, 24.0, 24.0);
    let long_text = "word ".repeat(300);
    assert!(engine.show_annotation_for(anchor, &long_text, viewport));

    {
        let state = surface.state.borrow();
        let (area, text) = state.annotation.as_ref().expect("annotation shown");
        assert!(text.ends_with('\u{2026}'), "long text was ellipsized");
        assert!(area.rect.x >= 0.0 && area.rect.right() <= 1000.0);
        assert!(area.arrow_x >= 12.0);
    }

    engine.hide_annotation();
    assert!(surface.state.borrow().annotation.is_none());
}

#[test]
fn annotation_survives_measurement_failure() {
    let source = MockSource::with_items(vec![item("a", 0.0)]);
    let surface = MockSurface::default();
    let mut engine = Engine::with_config(
        source,
        surface.clone(),
        MemoryStore::default(),
        GridMeasurer { fail: true },
        test_config(),
    );
    engine.init_at(Instant::now());

    let viewport = RectF::from_size(1000.0, 700.0);
    let anchor = RectF::new(500.0, 300.0, 24.0, 24.0);
    assert!(engine.show_annotation_for(anchor, "some text", viewport));

    let state = surface.state.borrow();
    let (area, text) = state.annotation.as_ref().expect("annotation still shown");
    assert_eq!(text, "some text", "untruncated on measurement failure");
    assert!(area.rect.height > 0.0, "best-effort fallback height");
}
