#![forbid(unsafe_code)]

//! Core primitives for the railmap engine.
//!
//! This crate holds the pieces every other railmap crate builds on:
//! floating-point page geometry ([`RectF`], [`ScrollMetrics`]), the
//! per-item marker record ([`Marker`]) with its persisted flag set, and
//! the three-lane [`SignalScheduler`] that turns host notifications
//! (structural change, resize, scroll) into coalesced recompute work.

pub mod geometry;
pub mod marker;
pub mod signal;

pub use geometry::{RectF, ScrollMetrics};
pub use marker::{Marker, MarkerFlags, MarkerId};
pub use signal::{DueWork, SchedulerConfig, SignalScheduler};
