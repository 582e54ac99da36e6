use crate::geometry::Bounds;
use crate::render::backend::{
    Capabilities, ContextRequest, GpuBackend, NativeContext, ProcAddress, RawContext,
};
use crate::render::extensions::{GL_FUNCTION_NAMES, SHADER_FUNCTION_NAMES};
use crate::render::texture::{DrawPath, TextureQuad};
use anyhow::{anyhow, Result};
use std::cell::Cell;
use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

thread_local! {
    // Raw handle of the null context bound on this thread, 0 for none.
    static BOUND: Cell<usize> = const { Cell::new(0) };
}

/// Counters shared between a [`NullBackend`] and every context it created.
#[derive(Debug, Default)]
pub struct NullStats {
    created: AtomicUsize,
    destroyed: AtomicUsize,
    failed: AtomicUsize,
    swaps: AtomicU64,
    bounds_updates: AtomicUsize,
    last_bounds: Mutex<Option<Bounds>>,
    draws: Mutex<Vec<(TextureQuad, DrawPath)>>,
    last_share: Mutex<Option<RawContext>>,
}

impl NullStats {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Contexts created and not yet dropped.
    pub fn live(&self) -> usize {
        self.created().saturating_sub(self.destroyed())
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn swaps(&self) -> u64 {
        self.swaps.load(Ordering::SeqCst)
    }

    pub fn bounds_updates(&self) -> usize {
        self.bounds_updates.load(Ordering::SeqCst)
    }

    pub fn last_bounds(&self) -> Option<Bounds> {
        *self.last_bounds.lock().unwrap()
    }

    pub fn draws(&self) -> Vec<(TextureQuad, DrawPath)> {
        self.draws.lock().unwrap().clone()
    }

    /// Share handle passed with the most recent creation request.
    pub fn last_share(&self) -> Option<RawContext> {
        *self.last_share.lock().unwrap()
    }
}

/// Headless backend that creates contexts without touching a GPU.
///
/// It tracks which thread each context is bound to, so a context made current
/// on two threads at once is refused the way a real driver would.
pub struct NullBackend {
    capabilities: Capabilities,
    frame_buffer_id: u32,
    notifies_closing: bool,
    fail_next: AtomicUsize,
    next_handle: AtomicUsize,
    stats: Arc<NullStats>,
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NullBackend {
    /// Creates a backend offering every capability.
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities::all(),
            frame_buffer_id: 0,
            notifies_closing: true,
            fail_next: AtomicUsize::new(0),
            next_handle: AtomicUsize::new(1),
            stats: Arc::new(NullStats::default()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Pretend rendering goes to an offscreen framebuffer with this id.
    pub fn with_frame_buffer_id(mut self, id: u32) -> Self {
        self.frame_buffer_id = id;
        self
    }

    /// Behave like a platform that cannot deliver the closing callback.
    pub fn without_closing_notification(mut self) -> Self {
        self.notifies_closing = false;
        self
    }

    /// Make the next `count` creation requests fail.
    pub fn fail_next_creations(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn stats(&self) -> Arc<NullStats> {
        self.stats.clone()
    }
}

impl GpuBackend for NullBackend {
    fn name(&self) -> &str {
        "NullBackend"
    }

    fn create_context(&self, request: &ContextRequest<'_>) -> Result<Box<dyn NativeContext>> {
        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            self.stats.failed.fetch_add(1, Ordering::SeqCst);
            return Err(anyhow!("NullBackend: simulated creation failure for {}", request.label));
        }

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let raw = RawContext::new(handle).ok_or_else(|| anyhow!("NullBackend: handle space exhausted"))?;

        *self.stats.last_share.lock().unwrap() = request.share_with;
        self.stats.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(NullContext {
            raw,
            capabilities: self.capabilities,
            frame_buffer_id: self.frame_buffer_id,
            notifies_closing: self.notifies_closing,
            swap_interval: 1,
            bounds: request.bounds,
            bound_on: Mutex::new(None),
            stats: self.stats.clone(),
        }))
    }
}

pub struct NullContext {
    raw: RawContext,
    capabilities: Capabilities,
    frame_buffer_id: u32,
    notifies_closing: bool,
    swap_interval: u32,
    bounds: Bounds,
    bound_on: Mutex<Option<ThreadId>>,
    stats: Arc<NullStats>,
}

impl NullContext {
    fn is_bound_here(&self) -> bool {
        BOUND.with(|b| b.get() == self.raw.get())
    }
}

impl NativeContext for NullContext {
    fn raw_context(&self) -> RawContext {
        self.raw
    }

    fn make_current(&mut self) -> bool {
        let me = std::thread::current().id();
        let mut bound_on = self.bound_on.lock().unwrap();

        if let Some(owner) = *bound_on {
            if owner != me && !self.is_bound_here() {
                log::warn!("NullContext {:?} is current on another thread", self.raw);
                return false;
            }
        }

        *bound_on = Some(me);
        BOUND.with(|b| b.set(self.raw.get()));
        true
    }

    fn release_current(&mut self) {
        if self.is_bound_here() {
            BOUND.with(|b| b.set(0));
            *self.bound_on.lock().unwrap() = None;
        }
    }

    fn swap_buffers(&mut self) {
        self.stats.swaps.fetch_add(1, Ordering::SeqCst);
    }

    fn set_swap_interval(&mut self, interval: u32) -> bool {
        if !self.capabilities.contains(Capabilities::SWAP_CONTROL) {
            return false;
        }
        self.swap_interval = interval;
        true
    }

    fn swap_interval(&self) -> u32 {
        self.swap_interval
    }

    fn update_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
        self.stats.bounds_updates.fetch_add(1, Ordering::SeqCst);
        *self.stats.last_bounds.lock().unwrap() = Some(bounds);
    }

    fn frame_buffer_id(&self) -> u32 {
        self.frame_buffer_id
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn get_proc_address(&self, name: &str) -> Option<ProcAddress> {
        if !self.capabilities.contains(Capabilities::SHADERS) && SHADER_FUNCTION_NAMES.contains(&name) {
            return None;
        }
        let idx = GL_FUNCTION_NAMES.iter().position(|n| *n == name)?;
        ProcAddress::from_ptr(((idx + 1) * 0x10) as *const c_void)
    }

    fn draw_texture(&mut self, quad: &TextureQuad, path: DrawPath) -> bool {
        if !self.is_bound_here() {
            return false;
        }
        self.stats.draws.lock().unwrap().push((*quad, path));
        true
    }

    fn notifies_closing(&self) -> bool {
        self.notifies_closing
    }
}

impl Drop for NullContext {
    fn drop(&mut self) {
        self.release_current();
        self.stats.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel_format::PixelFormat;

    fn request() -> ContextRequest<'static> {
        ContextRequest {
            pixel_format: PixelFormat::default(),
            share_with: None,
            bounds: Bounds::with_size(64, 64),
            window: None,
            label: "test",
        }
    }

    #[test]
    fn counts_creation_and_drop() {
        let backend = NullBackend::new();
        let stats = backend.stats();

        let ctx = backend.create_context(&request()).unwrap();
        assert_eq!(stats.created(), 1);
        assert_eq!(stats.live(), 1);

        drop(ctx);
        assert_eq!(stats.destroyed(), 1);
        assert_eq!(stats.live(), 0);
    }

    #[test]
    fn simulated_failures_are_consumed() {
        let backend = NullBackend::new();
        backend.fail_next_creations(2);

        assert!(backend.create_context(&request()).is_err());
        assert!(backend.create_context(&request()).is_err());
        assert!(backend.create_context(&request()).is_ok());
        assert_eq!(backend.stats().failed(), 2);
    }

    #[test]
    fn refuses_binding_on_second_thread() {
        let backend = NullBackend::new();
        let mut ctx = backend.create_context(&request()).unwrap();
        assert!(ctx.make_current());

        let refused = std::thread::scope(|s| s.spawn(|| ctx.make_current()).join().unwrap());
        assert!(!refused);

        ctx.release_current();
        let accepted = std::thread::scope(|s| s.spawn(|| ctx.make_current()).join().unwrap());
        assert!(accepted);
    }

    #[test]
    fn swap_control_depends_on_capabilities() {
        let backend = NullBackend::new().with_capabilities(Capabilities::SHADERS);
        let mut ctx = backend.create_context(&request()).unwrap();
        assert!(!ctx.set_swap_interval(0));
        assert_eq!(ctx.swap_interval(), 1);

        let backend = NullBackend::new();
        let mut ctx = backend.create_context(&request()).unwrap();
        assert!(ctx.set_swap_interval(0));
        assert_eq!(ctx.swap_interval(), 0);
    }

    #[test]
    fn shader_entry_points_hidden_without_shaders() {
        let backend = NullBackend::new().with_capabilities(Capabilities::SWAP_CONTROL);
        let ctx = backend.create_context(&request()).unwrap();
        assert!(ctx.get_proc_address("glCreateShader").is_none());
        assert!(ctx.get_proc_address("glGenBuffers").is_some());
    }
}
