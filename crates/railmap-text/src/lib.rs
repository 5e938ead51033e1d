#![forbid(unsafe_code)]

//! Text fitting for railmap annotations.
//!
//! Marker summaries can be arbitrarily long; annotations show at most a
//! fixed number of lines at a chosen width. [`fit`] finds the longest
//! prefix that renders within that budget, appending an ellipsis when
//! it truncates, with measurement delegated to the host through the
//! [`TextMeasurer`] seam and results memoized in a bounded cache.

pub mod fit;

pub use fit::{
    FitCacheStats, FitConfig, FitResult, MeasureError, TextFitter, TextMeasurer, TextMetrics,
};
