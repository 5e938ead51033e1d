#![forbid(unsafe_code)]

//! Line-budget fitting.
//!
//! Fitting asks the host to measure rendered text because only the
//! host knows the font metrics in effect. The fast path measures the
//! full text once; only when it overflows the line budget does a
//! binary search over cut points run, measuring `prefix + ellipsis` at
//! each probe. Cut points are pulled back to grapheme boundaries so a
//! probe never lands inside a multi-unit character.
//!
//! # Caching
//!
//! Results are memoized by `(text, width, layout flag)` in a bounded
//! LRU. The cache tracks a monotonically increasing generation
//! counter; a visual-theme change bumps the generation via
//! [`TextFitter::invalidate`] and entries from older generations are
//! treated as misses on access and lazily replaced, avoiding a bulk
//! clear. Measurement failures are never cached, so a recovering
//! backend is picked up on the next call.

use lru::LruCache;
use std::fmt;
use std::num::NonZeroUsize;
use unicode_segmentation::GraphemeCursor;

/// Ellipsis appended to truncated summaries.
pub const ELLIPSIS: &str = "…";
/// Default maximum number of rendered lines.
pub const MAX_SUMMARY_LINES: usize = 5;
/// Default memo-cache capacity.
pub const FIT_CACHE_CAPACITY: usize = 100;

/// Host-measured metrics for one rendered text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    /// Total rendered height in pixels.
    pub height: f64,
    /// Height of a single line in pixels.
    pub line_height: f64,
}

/// Measurement failure. The fitter degrades instead of propagating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasureError {
    /// The layout backend is not available right now.
    Unavailable,
    /// The backend failed with a reason.
    Backend(String),
}

impl fmt::Display for MeasureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => f.write_str("text measurement unavailable"),
            Self::Backend(reason) => write!(f, "text measurement failed: {reason}"),
        }
    }
}

impl std::error::Error for MeasureError {}

/// Measures rendered text at a target width.
///
/// `with_layout` selects the host's full-layout measurement path (the
/// one used when the result will actually be shown) versus a cheaper
/// estimate; the fitter treats it as an opaque cache-key component.
pub trait TextMeasurer {
    /// Measure `text` laid out at `width`.
    fn measure(
        &mut self,
        text: &str,
        width: f64,
        with_layout: bool,
    ) -> Result<TextMetrics, MeasureError>;
}

/// A fitted (possibly truncated) text.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// The text to render; ends with the ellipsis when truncated.
    pub text: String,
    /// Whether anything was cut.
    pub truncated: bool,
    /// Measured height of the fitted text; zero when measurement
    /// failed.
    pub height: f64,
}

/// Fitter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitConfig {
    /// Maximum rendered lines before truncation.
    pub max_lines: usize,
    /// Memo-cache capacity in entries.
    pub cache_capacity: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_lines: MAX_SUMMARY_LINES,
            cache_capacity: FIT_CACHE_CAPACITY,
        }
    }
}

/// Cache effectiveness counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FitCacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that ran a measurement.
    pub misses: u64,
    /// Entries pushed out by capacity.
    pub evictions: u64,
    /// Generation bumps (theme changes).
    pub invalidations: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FitKey {
    text: String,
    width_bits: u64,
    with_layout: bool,
}

#[derive(Debug, Clone)]
struct CachedFit {
    result: FitResult,
    generation: u64,
}

/// Fits text into a line budget through a [`TextMeasurer`].
pub struct TextFitter<M: TextMeasurer> {
    measurer: M,
    config: FitConfig,
    cache: LruCache<FitKey, CachedFit>,
    generation: u64,
    stats: FitCacheStats,
}

impl<M: TextMeasurer> TextFitter<M> {
    /// Create a fitter with the default line budget and cache size.
    pub fn new(measurer: M) -> Self {
        Self::with_config(measurer, FitConfig::default())
    }

    /// Create a fitter with explicit configuration.
    pub fn with_config(measurer: M, config: FitConfig) -> Self {
        let cap = NonZeroUsize::new(config.cache_capacity.max(1)).expect("capacity is >= 1");
        Self {
            measurer,
            config,
            cache: LruCache::new(cap),
            generation: 0,
            stats: FitCacheStats::default(),
        }
    }

    /// Cache counters.
    pub fn stats(&self) -> FitCacheStats {
        self.stats
    }

    /// Invalidate every cached fit.
    ///
    /// Call on visual-theme changes: font metrics may differ, so every
    /// memoized height is suspect. Entries are dropped lazily on
    /// access.
    pub fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.stats.invalidations += 1;
        tracing::debug!(generation = self.generation, "fit cache invalidated");
    }

    /// Fit `text` into the line budget at `width`.
    ///
    /// Never fails: a measurement error yields the untruncated text
    /// with zero height so the caller can proceed with best-effort
    /// sizing.
    pub fn fit(&mut self, text: &str, width: f64, with_layout: bool) -> FitResult {
        let key = FitKey {
            text: text.to_owned(),
            width_bits: width.to_bits(),
            with_layout,
        };

        if let Some(cached) = self.cache.get(&key) {
            if cached.generation == self.generation {
                self.stats.hits += 1;
                return cached.result.clone();
            }
            // Stale generation: lazily evict and fall through.
            self.cache.pop(&key);
        }
        self.stats.misses += 1;

        let result = match self.fit_uncached(text, width, with_layout) {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!(%err, "measurement failed, returning untruncated text");
                return FitResult {
                    text: text.to_owned(),
                    truncated: false,
                    height: 0.0,
                };
            }
        };

        if let Some((evicted_key, _)) = self.cache.push(
            key.clone(),
            CachedFit {
                result: result.clone(),
                generation: self.generation,
            },
        ) {
            if evicted_key != key {
                self.stats.evictions += 1;
            }
        }
        result
    }

    fn fit_uncached(
        &mut self,
        text: &str,
        width: f64,
        with_layout: bool,
    ) -> Result<FitResult, MeasureError> {
        let full = self.measurer.measure(text, width, with_layout)?;
        let budget = self.budget(full.line_height);

        if full.line_height <= 0.0 || full.height <= budget {
            return Ok(FitResult {
                text: text.to_owned(),
                truncated: false,
                height: full.height,
            });
        }

        // Binary search over byte cut points for the longest prefix
        // whose `prefix + ellipsis` still fits. The probe index is
        // pulled back to a grapheme boundary before measuring.
        let mut lo = 0usize;
        let mut hi = text.len();
        let mut best: Option<(usize, f64)> = None;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let cut = floor_grapheme_boundary(text, mid);
            let mut candidate = String::with_capacity(cut + ELLIPSIS.len());
            candidate.push_str(&text[..cut]);
            candidate.push_str(ELLIPSIS);

            let metrics = self.measurer.measure(&candidate, width, with_layout)?;
            if metrics.height <= self.budget(metrics.line_height) {
                best = Some((cut, metrics.height));
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        let (cut, height) = best.unwrap_or((0, full.line_height));
        let mut fitted = String::with_capacity(cut + ELLIPSIS.len());
        fitted.push_str(&text[..cut]);
        fitted.push_str(ELLIPSIS);
        Ok(FitResult {
            text: fitted,
            truncated: true,
            height,
        })
    }

    /// Allowed height for the configured line budget, with a small
    /// tolerance for sub-pixel rounding in host measurements.
    fn budget(&self, line_height: f64) -> f64 {
        self.config.max_lines as f64 * line_height + 0.5
    }
}

impl<M: TextMeasurer + fmt::Debug> fmt::Debug for TextFitter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextFitter")
            .field("measurer", &self.measurer)
            .field("config", &self.config)
            .field("generation", &self.generation)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Largest grapheme boundary `<= index`.
///
/// `index` may point anywhere into `text`, including mid-character;
/// the result is always safe to slice at.
pub fn floor_grapheme_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    let mut cursor = GraphemeCursor::new(i, text.len(), true);
    match cursor.is_boundary(text, 0) {
        Ok(true) => i,
        Ok(false) => cursor
            .prev_boundary(text, 0)
            .ok()
            .flatten()
            .unwrap_or(0),
        Err(_) => i,
    }
}
