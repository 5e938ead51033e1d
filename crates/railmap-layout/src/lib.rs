#![forbid(unsafe_code)]

//! Layout solvers for the railmap rail.
//!
//! Three concerns live here, all pure functions over plain data so they
//! can be exercised without a host:
//!
//! - [`rail`]: maps item document-offsets onto the oversized "long
//!   canvas" with a minimum visual gap between markers;
//! - [`window`]: binary-search virtualization window plus the
//!   reconciliation diff between successive windows;
//! - [`annotation`]: side selection, width tiers, viewport clamping,
//!   and arrow offsets for floating annotations.

pub mod annotation;
pub mod rail;
pub mod window;

pub use annotation::{Annotation, AnnotationArea, Side, Stack};
pub use rail::{RailGeometry, RailLayout};
pub use window::{LayoutVersion, VisibleRange, WindowDiff, lower_bound, upper_bound};
