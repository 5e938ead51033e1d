#![forbid(unsafe_code)]

//! Rendering surface contract.
//!
//! The engine is agnostic to how the rail is drawn. A host implements
//! [`RenderingSurface`] with whatever technology it renders with; the
//! engine only asks for lightweight per-marker visuals, position
//! updates, presentation-class toggles, and the two scroll hooks that
//! keep the long canvas and the content pane in lock-step.

use railmap_core::MarkerId;
use railmap_layout::AnnotationArea;

/// Presentation classes a marker visual can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerClass {
    /// The marker for the currently active item.
    Active,
    /// The user starred this item.
    Starred,
    /// The user pinned this item.
    Pinned,
}

/// Draws and positions the rail.
pub trait RenderingSurface {
    /// Handle to one live marker visual.
    type Handle;

    /// Create a visual for a marker at normalized position `n` and
    /// long-canvas offset `y`. Returns `None` when the visual cannot
    /// be created right now (e.g. the rail was detached mid-pass); the
    /// engine skips that marker and moves on.
    fn create_marker(&mut self, id: &MarkerId, n: f64, y: f64) -> Option<Self::Handle>;

    /// Move an existing visual.
    fn update_marker(&mut self, handle: &mut Self::Handle, n: f64, y: f64);

    /// Destroy a visual that left the virtualization window.
    fn release_marker(&mut self, handle: Self::Handle);

    /// Toggle a presentation class on a visual.
    fn set_class(&mut self, handle: &mut Self::Handle, class: MarkerClass, on: bool);

    /// Resize the long canvas.
    fn set_canvas_height(&mut self, height: f64);

    /// Scroll the long canvas to `offset`, keeping the rail in
    /// lock-step with the content pane.
    fn set_rail_scroll(&mut self, offset: f64);

    /// Scroll the real content pane so the given document offset is in
    /// view (marker jumps).
    fn scroll_content_to(&mut self, offset: f64);

    /// Show the floating annotation at a placed area.
    fn show_annotation(&mut self, area: &AnnotationArea, text: &str);

    /// Hide the floating annotation.
    fn hide_annotation(&mut self);
}
