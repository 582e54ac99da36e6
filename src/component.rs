//! Seam to the host's windowing/component system.
//!
//! A [`Context`](crate::context::Context) never creates windows itself. It
//! attaches to something implementing [`Component`] and follows it: the
//! component reports its bounds and visibility, and tells registered
//! [`ComponentListener`]s when either changes.

use std::sync::{Arc, Weak};

use raw_window_handle::RawWindowHandle;
use uuid::Uuid;

use crate::geometry::Bounds;

mod simple;

pub use simple::SimpleComponent;

/// Identifies a listener registration on a component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle notifications delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentEvent {
    /// Component was shown or hidden (itself or through an ancestor).
    VisibilityChanged,
    /// Size changed.
    Resized,
    /// Position changed, size did not.
    Moved,
    /// Component was moved to another parent, possibly another window.
    ParentChanged,
    /// Part of the component needs painting again.
    Invalidated,
    /// Component is going away. No events follow.
    Destroyed,
}

/// Where the component's 2D paint pass should draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintTarget {
    /// Framebuffer bound for the pass, 0 for the default one.
    pub frame_buffer_id: u32,
    pub width: u32,
    pub height: u32,
}

pub trait ComponentListener: Send + Sync {
    fn component_event(&self, event: ComponentEvent);
}

/// A UI element a context can render into.
///
/// Implementations are shared between the UI thread and the render thread,
/// hence `Send + Sync`. Listener callbacks may be delivered on any thread but
/// must not be delivered while the component holds its own internal locks.
pub trait Component: Send + Sync {
    /// Bounds in top-left origin pixels relative to the hosting window.
    fn bounds(&self) -> Bounds;

    /// True when the component and all its ancestors are visible.
    fn is_showing(&self) -> bool;

    /// Registers a listener. The component only keeps a weak reference.
    fn add_listener(&self, id: ListenerId, listener: Weak<dyn ComponentListener>);

    fn remove_listener(&self, id: ListenerId);

    /// Native window the component lives in, handed to the GPU backend.
    fn raw_window_handle(&self) -> Option<RawWindowHandle> {
        None
    }

    /// 2D paint pass, run on the render thread with the context current.
    fn paint_gl(&self, _target: &PaintTarget) {}
}

/// A component can host a native context once it is showing and has area.
pub fn is_renderable(component: &dyn Component) -> bool {
    component.is_showing() && !component.bounds().is_empty()
}

/// Identity comparison for shared components.
pub fn same_component(a: &Arc<dyn Component>, b: &Arc<dyn Component>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
