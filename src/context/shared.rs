use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use super::associated::AssociatedObjects;
use super::repaint::RepaintSignal;
use super::ContextId;
use crate::geometry::Bounds;
use crate::render::{ExtensionFunctions, NativeContext, RawContext};
use crate::renderer::Renderer;

/// State shared by a [`Context`](super::Context), its handles, its attachment
/// and whichever render thread is current.
pub(crate) struct ContextShared {
    pub(crate) id: ContextId,
    width: AtomicU32,
    height: AtomicU32,
    renderer: RwLock<Option<Weak<dyn Renderer>>>,
    /// Image of the running render thread, if any.
    image: RwLock<Option<Arc<ImageShared>>>,
    frames: AtomicU64,
}

impl ContextShared {
    pub(crate) fn new(id: ContextId) -> Self {
        Self {
            id,
            width: AtomicU32::new(0),
            height: AtomicU32::new(0),
            renderer: RwLock::new(None),
            image: RwLock::new(None),
            frames: AtomicU64::new(0),
        }
    }

    pub(crate) fn set_size(&self, width: u32, height: u32) {
        self.width.store(width, Ordering::SeqCst);
        self.height.store(height, Ordering::SeqCst);
    }

    pub(crate) fn width(&self) -> u32 {
        self.width.load(Ordering::SeqCst)
    }

    pub(crate) fn height(&self) -> u32 {
        self.height.load(Ordering::SeqCst)
    }

    pub(crate) fn set_renderer(&self, renderer: Option<Weak<dyn Renderer>>) {
        *self.renderer.write().unwrap() = renderer;
    }

    pub(crate) fn has_renderer(&self) -> bool {
        self.renderer.read().unwrap().is_some()
    }

    /// The renderer, if one is set and still alive.
    pub(crate) fn renderer(&self) -> Option<Arc<dyn Renderer>> {
        self.renderer.read().unwrap().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn image(&self) -> Option<Arc<ImageShared>> {
        self.image.read().unwrap().clone()
    }

    pub(crate) fn set_image(&self, image: Arc<ImageShared>) {
        *self.image.write().unwrap() = Some(image);
    }

    /// Unpublishes `image` unless a newer one has replaced it already.
    pub(crate) fn clear_image(&self, image: &Arc<ImageShared>) {
        let mut current = self.image.write().unwrap();
        if current.as_ref().map_or(false, |c| Arc::ptr_eq(c, image)) {
            *current = None;
        }
    }

    pub(crate) fn count_frame(&self) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}

/// Everything that lives exactly as long as one native context: the context
/// itself, its entry points, its associated objects and the signal its render
/// thread sleeps on.
pub(crate) struct ImageShared {
    /// Owned by the render thread while running. Locked briefly, never across
    /// renderer callbacks.
    native: Mutex<Option<Box<dyn NativeContext>>>,
    raw: Mutex<Option<RawContext>>,
    extensions: RwLock<Arc<ExtensionFunctions>>,
    shaders_available: AtomicBool,
    pending_bounds: Mutex<Option<Bounds>>,
    paint_dirty: AtomicBool,
    pub(crate) associated: AssociatedObjects,
    pub(crate) repaint: RepaintSignal,
}

impl Default for ImageShared {
    fn default() -> Self {
        Self {
            native: Mutex::new(None),
            raw: Mutex::new(None),
            extensions: RwLock::new(Arc::new(ExtensionFunctions::default())),
            shaders_available: AtomicBool::new(false),
            pending_bounds: Mutex::new(None),
            paint_dirty: AtomicBool::new(true),
            associated: AssociatedObjects::default(),
            repaint: RepaintSignal::default(),
        }
    }
}

impl ImageShared {
    pub(crate) fn new(native: Box<dyn NativeContext>) -> Self {
        let image = Self::default();
        *image.raw.lock().unwrap() = Some(native.raw_context());
        *image.native.lock().unwrap() = Some(native);
        image
    }

    /// Runs `f` against the native context, if it has not been released yet.
    pub(crate) fn with_native<R>(&self, f: impl FnOnce(&mut dyn NativeContext) -> R) -> Option<R> {
        let mut native = self.native.lock().unwrap();
        native.as_mut().map(|n| f(n.as_mut()))
    }

    pub(crate) fn take_native(&self) -> Option<Box<dyn NativeContext>> {
        *self.raw.lock().unwrap() = None;
        self.native.lock().unwrap().take()
    }

    pub(crate) fn raw_context(&self) -> Option<RawContext> {
        *self.raw.lock().unwrap()
    }

    pub(crate) fn extensions(&self) -> Arc<ExtensionFunctions> {
        self.extensions.read().unwrap().clone()
    }

    pub(crate) fn set_extensions(&self, extensions: ExtensionFunctions, shaders: bool) {
        *self.extensions.write().unwrap() = Arc::new(extensions);
        self.shaders_available.store(shaders, Ordering::SeqCst);
    }

    pub(crate) fn shaders_available(&self) -> bool {
        self.raw_context().is_some() && self.shaders_available.load(Ordering::SeqCst)
    }

    /// New component bounds, applied at the start of the next frame.
    pub(crate) fn post_bounds(&self, bounds: Bounds) {
        *self.pending_bounds.lock().unwrap() = Some(bounds);
        self.repaint.trigger();
    }

    pub(crate) fn take_pending_bounds(&self) -> Option<Bounds> {
        self.pending_bounds.lock().unwrap().take()
    }

    /// Marks the 2D paint pass dirty and asks for a frame.
    pub(crate) fn invalidate_paint(&self) {
        self.paint_dirty.store(true, Ordering::SeqCst);
        self.repaint.trigger();
    }

    pub(crate) fn mark_paint_dirty(&self) {
        self.paint_dirty.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_paint_dirty(&self) -> bool {
        self.paint_dirty.swap(false, Ordering::SeqCst)
    }
}
