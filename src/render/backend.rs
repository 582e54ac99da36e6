use std::ffi::c_void;
use std::num::NonZeroUsize;

use bitflags::bitflags;
use raw_window_handle::RawWindowHandle;

use crate::geometry::Bounds;
use crate::pixel_format::PixelFormat;
use crate::render::texture::{DrawPath, TextureQuad};

/// Opaque handle to the platform's GL context (an `HGLRC`, `GLXContext`,
/// `EGLContext`...). Only meaningful to the backend that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawContext(NonZeroUsize);

impl RawContext {
    /// Wraps a raw handle value. Returns `None` for a null handle.
    pub fn new(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Self)
    }

    pub fn from_ptr(ptr: *const c_void) -> Option<Self> {
        Self::new(ptr as usize)
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

/// Address of a dynamically resolved driver entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProcAddress(NonZeroUsize);

impl ProcAddress {
    pub fn from_ptr(ptr: *const c_void) -> Option<Self> {
        NonZeroUsize::new(ptr as usize).map(Self)
    }

    pub fn as_ptr(&self) -> *const c_void {
        self.0.get() as *const c_void
    }
}

bitflags! {
    /// Optional features a native context may or may not offer.
    pub struct Capabilities: u8 {
        /// GLSL programs can be compiled and used.
        const SHADERS             = 0b0001;
        /// The swap interval can be changed.
        const SWAP_CONTROL        = 0b0010;
        /// Offscreen framebuffer objects are available.
        const FRAMEBUFFER_OBJECTS = 0b0100;
    }
}

/// Everything a backend needs to create a context for a component.
#[derive(Debug, Clone)]
pub struct ContextRequest<'a> {
    /// Preferred surface format.
    pub pixel_format: PixelFormat,
    /// Context whose objects should be shared with the new one.
    pub share_with: Option<RawContext>,
    /// Component bounds at creation time.
    pub bounds: Bounds,
    /// Host window the surface is placed in, if the component has one.
    pub window: Option<RawWindowHandle>,
    /// Human readable label for logs and debug tooling.
    pub label: &'a str,
}

/// One real platform GL context plus its drawable surface.
///
/// Dropping the box destroys the context and surface. The render thread owns
/// the context while the attachment is running, so every method here is
/// called from that thread except during creation.
pub trait NativeContext: Send {
    /// Platform handle of the underlying context.
    fn raw_context(&self) -> RawContext;

    /// Binds the context to the calling thread. Returns false on failure.
    fn make_current(&mut self) -> bool;

    /// Unbinds the context from the calling thread.
    fn release_current(&mut self);

    /// Presents the back buffer.
    fn swap_buffers(&mut self);

    /// Returns false if the platform or driver does not allow changing it.
    fn set_swap_interval(&mut self, interval: u32) -> bool;

    fn swap_interval(&self) -> u32;

    /// Component moved or resized.
    fn update_bounds(&mut self, bounds: Bounds);

    /// Framebuffer drawn into, 0 for the default framebuffer.
    fn frame_buffer_id(&self) -> u32 {
        0
    }

    fn capabilities(&self) -> Capabilities;

    /// Resolves a driver entry point by name.
    fn get_proc_address(&self, name: &str) -> Option<ProcAddress>;

    /// Draws the currently bound texture through `quad`.
    fn draw_texture(&mut self, quad: &TextureQuad, path: DrawPath) -> bool;

    /// False where the platform tears the surface down before the closing
    /// callback can run with a current context.
    fn notifies_closing(&self) -> bool {
        !cfg!(target_os = "android")
    }
}

/// Platform GL seam. Creates native contexts for attached components.
pub trait GpuBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Create a new native context. Called on the thread that attached the
    /// context or delivered the component change. When a render thread asked
    /// for its own recreation, called on that thread after it released its
    /// native context.
    fn create_context(&self, request: &ContextRequest<'_>) -> anyhow::Result<Box<dyn NativeContext>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handles_are_rejected() {
        assert!(RawContext::new(0).is_none());
        assert!(ProcAddress::from_ptr(std::ptr::null()).is_none());
        assert_eq!(RawContext::new(42).map(|r| r.get()), Some(42));
    }

    #[test]
    fn proc_address_round_trips_pointer() {
        let value = 0x1000usize;
        let addr = ProcAddress::from_ptr(value as *const c_void).unwrap();
        assert_eq!(addr.as_ptr() as usize, value);
    }

    #[test]
    fn capabilities_combine() {
        let caps = Capabilities::SHADERS | Capabilities::SWAP_CONTROL;
        assert!(caps.contains(Capabilities::SHADERS));
        assert!(!caps.contains(Capabilities::FRAMEBUFFER_OBJECTS));
    }
}
