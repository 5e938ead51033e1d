#![forbid(unsafe_code)]

//! Railmap public facade crate.
//!
//! Railmap augments long, continuously growing document panes with a
//! compact "minimap" rail: one marker per content item, laid out
//! collision-free on an oversized long canvas, virtualized down to the
//! on-screen subset, with active-item tracking and floating
//! annotations. This crate re-exports the public surface from the
//! internal crates and offers a lightweight prelude.
//!
//! The host wires four collaborator seams (an item source, a rendering
//! surface, a marker store, and a text measurer) into an [`Engine`]
//! and drives it with its own notifications:
//!
//! ```ignore
//! use railmap::prelude::*;
//!
//! let mut engine = Engine::new(source, surface, store, measurer);
//! engine.init();
//! // on scroll:   engine.notify_scroll(metrics);
//! // per frame:   engine.tick();
//! // on teardown: engine.destroy();
//! ```

// --- Core re-exports -------------------------------------------------------

pub use railmap_core::geometry::{RectF, ScrollMetrics, clamp01};
pub use railmap_core::marker::{Marker, MarkerFlags, MarkerId};
pub use railmap_core::signal::{DueWork, SchedulerConfig, SignalScheduler};

// --- Layout re-exports -----------------------------------------------------

pub use railmap_layout::annotation::{Annotation, AnnotationArea, Side, Stack};
pub use railmap_layout::rail::{RailGeometry, RailLayout};
pub use railmap_layout::window::{
    LayoutVersion, VisibleRange, WindowDiff, lower_bound, upper_bound,
};

// --- Text re-exports -------------------------------------------------------

pub use railmap_text::{
    FitCacheStats, FitConfig, FitResult, MeasureError, TextFitter, TextMeasurer, TextMetrics,
};

// --- Engine re-exports -----------------------------------------------------

pub use railmap_engine::active::{ActiveConfig, ActiveTracker, ScrollOrigin};
pub use railmap_engine::controller::{Engine, EngineConfig, EngineSummary, WindowPass};
pub use railmap_engine::source::{
    ItemSource, MarkerStore, NullStore, SourceRegistry, StoreError,
};
pub use railmap_engine::surface::{MarkerClass, RenderingSurface};

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::{
        ActiveConfig, Annotation, Engine, EngineConfig, ItemSource, Marker, MarkerClass,
        MarkerFlags, MarkerId, MarkerStore, NullStore, RailGeometry, RectF, RenderingSurface,
        ScrollMetrics, ScrollOrigin, Side, SourceRegistry, TextMeasurer, TextMetrics,
        VisibleRange,
    };
}
