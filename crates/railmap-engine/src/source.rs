#![forbid(unsafe_code)]

//! Item source and persistence collaborator contracts.
//!
//! The engine never inspects document content. An [`ItemSource`] hands
//! it opaque item handles with a stable id, a summary string, and a
//! pixel offset; a [`MarkerStore`] persists the starred/pinned flags.
//! Both are capability seams: hosts implement them for whatever site
//! or storage they sit on, and every store failure is swallowed at the
//! call site (flags simply default to unset).

use railmap_core::MarkerId;
use std::fmt;

/// Supplies the ordered content items of one document instance.
///
/// Implementations must tolerate being called while the item count is
/// transiently zero (mid-navigation); the engine treats an empty
/// listing as "try again shortly", not as an empty document.
pub trait ItemSource {
    /// Opaque handle to one content item. Owned by the host document;
    /// the engine only carries it.
    type Item;

    /// The items in document order.
    fn list_items(&self) -> Vec<Self::Item>;

    /// Stable id for an item. `index` is the item's position in the
    /// current listing, for sources that derive ids positionally.
    fn id_of(&self, item: &Self::Item, index: usize) -> MarkerId;

    /// Extracted display text for an item.
    fn summary_of(&self, item: &Self::Item) -> String;

    /// Pixel offset of the item relative to its container, or `None`
    /// when the item's element has gone missing mid-operation.
    fn offset_of(&self, item: &Self::Item) -> Option<f64>;
}

/// Selects one item source variant for a document location.
///
/// Hosts embed the engine on a closed set of known sites, each with its
/// own discovery logic behind the [`ItemSource`] seam. The registry
/// pairs a location matcher with a source factory; the first matching
/// entry wins. Lookup happens once when the engine is embedded, never
/// re-evaluated at runtime.
pub struct SourceRegistry<S> {
    entries: Vec<RegistryEntry<S>>,
}

struct RegistryEntry<S> {
    matches: Box<dyn Fn(&str) -> bool>,
    build: Box<dyn Fn() -> S>,
}

impl<S> SourceRegistry<S> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a source variant. Entries are tried in registration
    /// order.
    pub fn register(
        &mut self,
        matches: impl Fn(&str) -> bool + 'static,
        build: impl Fn() -> S + 'static,
    ) {
        self.entries.push(RegistryEntry {
            matches: Box::new(matches),
            build: Box::new(build),
        });
    }

    /// Build the source for the first entry matching `location`.
    #[must_use]
    pub fn select(&self, location: &str) -> Option<S> {
        self.entries
            .iter()
            .find(|entry| (entry.matches)(location))
            .map(|entry| (entry.build)())
    }

    /// Number of registered variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no variants are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S> Default for SourceRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for SourceRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Persistence failure. Always swallowed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The storage backend is not available.
    Unavailable,
    /// The backend failed with a reason.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => f.write_str("marker store unavailable"),
            Self::Backend(reason) => write!(f, "marker store failed: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Key/value persistence for marker flags.
pub trait MarkerStore {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Write a value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Delete a value.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    /// All stored keys starting with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Store that persists nothing, for hosts without storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl MarkerStore for NullStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }
}

/// Key prefix for starred markers.
pub const STAR_KEY_PREFIX: &str = "star:";
/// Key prefix for pinned markers.
pub const PIN_KEY_PREFIX: &str = "pin:";

/// Storage key for a marker's starred flag.
pub fn star_key(id: &MarkerId) -> String {
    format!("{STAR_KEY_PREFIX}{id}")
}

/// Storage key for a marker's pinned flag.
pub fn pin_key(id: &MarkerId) -> String {
    format!("{PIN_KEY_PREFIX}{id}")
}

/// Split a storage key into its flag prefix and marker id.
pub fn parse_flag_key(key: &str) -> Option<(&'static str, MarkerId)> {
    if let Some(id) = key.strip_prefix(STAR_KEY_PREFIX) {
        Some((STAR_KEY_PREFIX, MarkerId::new(id)))
    } else if let Some(id) = key.strip_prefix(PIN_KEY_PREFIX) {
        Some((PIN_KEY_PREFIX, MarkerId::new(id)))
    } else {
        None
    }
}
