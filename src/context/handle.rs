use std::any::Any;
use std::sync::Arc;

use super::associated::AssociatedObject;
use super::current;
use super::shared::{ContextShared, ImageShared};
use super::ContextId;
use crate::geometry::Bounds;
use crate::render::{DrawPath, ExtensionFunctions, RawContext, TextureQuad};

/// Cloneable view of a context, usable from any thread.
///
/// Renderer callbacks receive one bound to the native context they are
/// called for, and [`Context::current`](super::Context::current) returns one
/// bound to the native context active on the calling thread. Other handles
/// follow whichever native context is current for the context.
///
/// Operations that touch GPU state (`swap_buffers`, `copy_texture`,
/// associated objects...) are only meaningful on the thread the context is
/// active on, normally its render thread.
#[derive(Clone)]
pub struct ContextHandle {
    shared: Arc<ContextShared>,
    image: Option<Arc<ImageShared>>,
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle").field("id", &self.shared.id).finish_non_exhaustive()
    }
}

impl PartialEq for ContextHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for ContextHandle {}

impl ContextHandle {
    pub(crate) fn new(shared: Arc<ContextShared>) -> Self {
        Self { shared, image: None }
    }

    pub(crate) fn bound(shared: Arc<ContextShared>, image: Arc<ImageShared>) -> Self {
        Self { shared, image: Some(image) }
    }

    pub(crate) fn shared(&self) -> &Arc<ContextShared> {
        &self.shared
    }

    fn image(&self) -> Option<Arc<ImageShared>> {
        self.image.clone().or_else(|| self.shared.image())
    }

    pub fn id(&self) -> ContextId {
        self.shared.id
    }

    pub fn width(&self) -> u32 {
        self.shared.width()
    }

    pub fn height(&self) -> u32 {
        self.shared.height()
    }

    /// Binds the native context to the calling thread and records it as the
    /// thread's active context. False when there is no native context or the
    /// driver refused.
    pub fn make_active(&self) -> bool {
        let Some(image) = self.image() else {
            return false;
        };
        let bound = image.with_native(|n| n.make_current()).unwrap_or(false);
        if bound {
            current::set(&self.shared, &image);
        }
        bound
    }

    /// True when this context is the one registered as active on the calling thread.
    pub fn is_active(&self) -> bool {
        current::is(&self.shared, self.image.as_deref())
    }

    /// Unbinds the native context from the calling thread, if it is active here.
    pub fn release_current(&self) {
        if !self.is_active() {
            return;
        }
        if let Some((_, image)) = current::get() {
            image.with_native(|n| n.release_current());
        }
        current::clear();
    }

    pub fn swap_buffers(&self) {
        if let Some(image) = self.image() {
            image.with_native(|n| n.swap_buffers());
        }
    }

    /// False if the platform or driver does not support it, in which case the
    /// previous interval stays in effect.
    pub fn set_swap_interval(&self, interval: u32) -> bool {
        self.image()
            .and_then(|image| image.with_native(|n| n.set_swap_interval(interval)))
            .unwrap_or(false)
    }

    /// 0 when no native context exists.
    pub fn swap_interval(&self) -> u32 {
        self.image()
            .and_then(|image| image.with_native(|n| n.swap_interval()))
            .unwrap_or(0)
    }

    pub fn frame_buffer_id(&self) -> u32 {
        self.image()
            .and_then(|image| image.with_native(|n| n.frame_buffer_id()))
            .unwrap_or(0)
    }

    pub fn are_shaders_available(&self) -> bool {
        self.image().map_or(false, |image| image.shaders_available())
    }

    /// Entry points resolved for the current native context. Empty when none exists.
    pub fn extensions(&self) -> Arc<ExtensionFunctions> {
        self.image()
            .map_or_else(|| Arc::new(ExtensionFunctions::default()), |image| image.extensions())
    }

    pub fn raw_context(&self) -> Option<RawContext> {
        self.image().and_then(|image| image.raw_context())
    }

    /// Asks the render thread for another frame. Never blocks; repeated calls
    /// before the next frame collapse into one. Does nothing without a
    /// running render thread.
    pub fn trigger_repaint(&self) {
        if let Some(image) = self.image() {
            image.repaint.trigger();
        }
    }

    /// Frames completed across the context's lifetime.
    pub fn frames_rendered(&self) -> u64 {
        self.shared.frames()
    }

    /// Looks up an object stored with [`set_associated_object`](Self::set_associated_object).
    /// Call only while this context is active on the calling thread.
    pub fn associated_object(&self, name: &str) -> Option<AssociatedObject> {
        debug_assert!(self.is_active(), "associated objects used while context is not active");
        self.image()?.associated.get(name)
    }

    /// Typed variant of [`associated_object`](Self::associated_object).
    pub fn associated_object_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.associated_object(name).and_then(|obj| obj.downcast::<T>().ok())
    }

    /// Stores an object that lives until the native context is destroyed.
    /// Replaces (and releases) any previous object with the same name; `None`
    /// removes the entry. Call only while this context is active.
    pub fn set_associated_object(&self, name: &str, object: Option<AssociatedObject>) {
        debug_assert!(self.is_active(), "associated objects used while context is not active");
        if let Some(image) = self.image() {
            image.associated.set(name, object);
        }
    }

    /// Draws the currently bound texture at `anchor` (top-left position and
    /// full texture size) into a `width` x `height` target, clipped to
    /// `target_clip`. Coordinates are top-left origin.
    ///
    /// Returns false when the context is not active here, nothing is visible,
    /// or the native context could not draw.
    pub fn copy_texture(&self, target_clip: Bounds, anchor: Bounds, width: u32, height: u32) -> bool {
        if !self.is_active() {
            return false;
        }
        let Some(image) = self.image() else {
            return false;
        };
        let Some(quad) = TextureQuad::new(target_clip, anchor, width, height) else {
            return false;
        };
        let path = if image.shaders_available() { DrawPath::Shader } else { DrawPath::Legacy };

        image.with_native(|n| n.draw_texture(&quad, path)).unwrap_or(false)
    }
}
