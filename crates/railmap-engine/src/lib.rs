#![forbid(unsafe_code)]

//! The railmap engine.
//!
//! Ties the solvers together behind the collaborator seams: an
//! [`ItemSource`] supplies opaque content items, a [`RenderingSurface`]
//! draws the rail, a [`MarkerStore`] persists starred/pinned flags, and
//! a [`railmap_text::TextMeasurer`] measures annotation text. The
//! [`Engine`] controller owns the marker collection and the explicit
//! `init`/`recalculate`/`destroy` lifecycle; [`ActiveTracker`] decides
//! which item is active under scroll, with flicker suppression.
//!
//! # Error philosophy
//!
//! Public operations never panic and never surface collaborator
//! failures to the host. Transiently empty item listings are retried
//! once; measurement failures fall back to untruncated text;
//! persistence failures are logged and swallowed; stale virtualization
//! passes are discarded. Nothing is fatal except an explicit
//! [`Engine::destroy`].

pub mod active;
pub mod controller;
pub mod source;
pub mod surface;

pub use active::{ActiveConfig, ActiveTracker, ScrollOrigin};
pub use controller::{Engine, EngineConfig, EngineSummary, WindowPass};
pub use source::{
    ItemSource, MarkerStore, NullStore, SourceRegistry, StoreError, pin_key, star_key,
};
pub use surface::{MarkerClass, RenderingSurface};
