//! The context facade.
//!
//! A [`Context`] ties a [`Renderer`] to a [`Component`]. Once attached it
//! waits for the component to become visible, asks the [`GpuBackend`] for a
//! native context and starts a render thread that calls the renderer every
//! frame. Detaching (or dropping the context) stops the thread and releases
//! everything it created, in order.
//!
//! ```no_run
//! use std::sync::Arc;
//! use gosub_gl::component::SimpleComponent;
//! use gosub_gl::context::{Context, ContextHandle};
//! use gosub_gl::geometry::Bounds;
//! use gosub_gl::render::backends::null::NullBackend;
//! use gosub_gl::renderer::Renderer;
//!
//! struct Clear;
//!
//! impl Renderer for Clear {
//!     fn new_context_created(&self, _ctx: &ContextHandle) {}
//!     fn render(&self, _ctx: &ContextHandle) {}
//!     fn context_closing(&self, _ctx: &ContextHandle) {}
//! }
//!
//! let renderer = Arc::new(Clear);
//! let component = SimpleComponent::new(Bounds::with_size(640, 480), true);
//!
//! let mut context = Context::new(Arc::new(NullBackend::new()));
//! context.set_renderer(&renderer);
//! context.attach_to(component);
//! // ...
//! context.detach();
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use uuid::Uuid;

use crate::component::{same_component, Component};
use crate::config::ContextConfig;
use crate::geometry::Bounds;
use crate::pixel_format::PixelFormat;
use crate::render::{ExtensionFunctions, GpuBackend, RawContext};
use crate::renderer::Renderer;

mod associated;
mod attachment;
mod cached_image;
mod current;
mod handle;
mod repaint;
mod shared;

pub use associated::AssociatedObject;
pub use attachment::AttachmentState;
pub use handle::ContextHandle;

use attachment::Attachment;
use shared::ContextShared;

/// Identifies a context in logs and across handles.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

/// One GPU rendering session bound to a component.
///
/// Configuration (renderer, pixel format, share context, component painting)
/// must be set before [`attach_to`](Self::attach_to). Changes made while
/// attached are ignored and logged.
pub struct Context {
    handle: ContextHandle,
    backend: Arc<dyn GpuBackend>,
    config: ContextConfig,
    share_with: Option<Weak<ContextShared>>,
    attachment: Option<Arc<Attachment>>,
}

impl Context {
    pub fn new(backend: Arc<dyn GpuBackend>) -> Self {
        Self::with_config(backend, ContextConfig::default())
    }

    pub fn with_config(backend: Arc<dyn GpuBackend>, config: ContextConfig) -> Self {
        let shared = Arc::new(ContextShared::new(ContextId::new()));
        Self {
            handle: ContextHandle::new(shared),
            backend,
            config,
            share_with: None,
            attachment: None,
        }
    }

    pub fn id(&self) -> ContextId {
        self.handle.id()
    }

    /// A cloneable handle for use from other threads.
    pub fn handle(&self) -> ContextHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    fn ignored_while_attached(&self, what: &str) -> bool {
        if self.attachment.is_some() {
            log::warn!("Context[{}]: {} ignored while attached", self.id(), what);
            return true;
        }
        false
    }

    /// Sets the renderer. Only a weak reference is kept: the caller owns it.
    pub fn set_renderer<R: Renderer + 'static>(&mut self, renderer: &Arc<R>) {
        if self.ignored_while_attached("set_renderer") {
            return;
        }
        let weak = Arc::downgrade(renderer) as Weak<dyn Renderer>;
        self.handle.shared().set_renderer(Some(weak));
    }

    /// Removes the renderer. Allowed at any time; a running render thread
    /// stops calling it from the next frame on, `context_closing` included.
    pub fn clear_renderer(&mut self) {
        if self.handle.shared().has_renderer() {
            log::debug!("Context[{}]: renderer cleared", self.id());
        }
        self.handle.shared().set_renderer(None);
    }

    /// Whether the component's own paint pass runs through the context after
    /// each `render`.
    pub fn set_component_painting_enabled(&mut self, enabled: bool) {
        if self.ignored_while_attached("set_component_painting_enabled") {
            return;
        }
        self.config.component_painting = enabled;
    }

    pub fn set_pixel_format(&mut self, format: PixelFormat) {
        if self.ignored_while_attached("set_pixel_format") {
            return;
        }
        self.config.pixel_format = format;
    }

    /// Shares GL objects with `other`'s native context. `other` must be
    /// running by the time this context creates its own, otherwise creation
    /// proceeds unshared.
    pub fn set_context_to_share_with(&mut self, other: Option<&Context>) {
        if self.ignored_while_attached("set_context_to_share_with") {
            return;
        }
        self.share_with = other.map(|o| Arc::downgrade(o.handle.shared()));
    }

    /// Attaches to `component`. A no-op when already attached to it; detaches
    /// from any other component first.
    pub fn attach_to(&mut self, component: Arc<dyn Component>) {
        if let Some(current) = self.attachment.as_ref().and_then(|a| a.component()) {
            if same_component(&current, &component) {
                return;
            }
        }
        self.detach();

        log::debug!("Context[{}]: attaching", self.id());
        self.attachment = Some(Attachment::attach(
            self.handle.shared().clone(),
            self.backend.clone(),
            self.config.clone(),
            self.share_with.clone(),
            component,
        ));
    }

    /// Detaches from the component. Blocks until the render thread has exited
    /// and the native context is released. Does nothing when not attached.
    pub fn detach(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            attachment.detach();
        }
    }

    /// True while a native context exists and the render thread runs.
    pub fn is_attached(&self) -> bool {
        self.state() == AttachmentState::Running
    }

    pub fn state(&self) -> AttachmentState {
        self.attachment
            .as_ref()
            .map_or(AttachmentState::Unattached, |a| a.state())
    }

    pub fn target_component(&self) -> Option<Arc<dyn Component>> {
        self.attachment.as_ref().and_then(|a| a.component())
    }

    /// The context active on the calling thread, if any.
    pub fn current() -> Option<ContextHandle> {
        current::get().map(|(shared, image)| ContextHandle::bound(shared, image))
    }

    /// Releases whatever context is active on the calling thread.
    pub fn deactivate_current() {
        match current::get() {
            Some((shared, image)) => ContextHandle::bound(shared, image).release_current(),
            None => current::clear(),
        }
    }

    pub fn trigger_repaint(&self) {
        self.handle.trigger_repaint();
    }

    pub fn width(&self) -> u32 {
        self.handle.width()
    }

    pub fn height(&self) -> u32 {
        self.handle.height()
    }

    pub fn frame_buffer_id(&self) -> u32 {
        self.handle.frame_buffer_id()
    }

    pub fn are_shaders_available(&self) -> bool {
        self.handle.are_shaders_available()
    }

    pub fn extensions(&self) -> Arc<ExtensionFunctions> {
        self.handle.extensions()
    }

    pub fn make_active(&self) -> bool {
        self.handle.make_active()
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }

    pub fn swap_buffers(&self) {
        self.handle.swap_buffers()
    }

    pub fn set_swap_interval(&self, interval: u32) -> bool {
        self.handle.set_swap_interval(interval)
    }

    pub fn swap_interval(&self) -> u32 {
        self.handle.swap_interval()
    }

    /// Platform handle of the native context, `None` while there is none.
    pub fn raw_context(&self) -> Option<RawContext> {
        self.handle.raw_context()
    }

    pub fn copy_texture(&self, target_clip: Bounds, anchor: Bounds, width: u32, height: u32) -> bool {
        self.handle.copy_texture(target_clip, anchor, width, height)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.detach();
        current::clear_if(self.handle.shared());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentListener, ListenerId, PaintTarget, SimpleComponent};
    use crate::render::backends::null::{NullBackend, NullStats};
    use crate::render::{Capabilities, DrawPath};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Created,
        Render,
        Closing,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Call>>,
        closing_had_context: AtomicBool,
        current_matched: Mutex<Vec<bool>>,
    }

    impl Recorder {
        fn count(&self, call: Call) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Renderer for Recorder {
        fn new_context_created(&self, _context: &ContextHandle) {
            self.calls.lock().unwrap().push(Call::Created);
        }

        fn render(&self, context: &ContextHandle) {
            let matched = Context::current().as_ref() == Some(context);
            self.current_matched.lock().unwrap().push(matched);
            self.calls.lock().unwrap().push(Call::Render);
        }

        fn context_closing(&self, context: &ContextHandle) {
            let alive = context.raw_context().is_some() && context.is_active();
            self.closing_had_context.store(alive, Ordering::SeqCst);
            self.calls.lock().unwrap().push(Call::Closing);
        }
    }

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn wait_until(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn visible() -> Arc<SimpleComponent> {
        SimpleComponent::new(Bounds::new(0, 0, 320, 240), true)
    }

    fn setup(backend: NullBackend, config: ContextConfig) -> (Context, Arc<NullBackend>, Arc<Recorder>) {
        init_logger();
        let backend = Arc::new(backend);
        let renderer = Arc::new(Recorder::default());
        let mut ctx = Context::with_config(backend.clone(), config);
        ctx.set_renderer(&renderer);
        (ctx, backend, renderer)
    }

    #[test]
    fn detach_stops_thread_and_releases_native() {
        let (mut ctx, backend, renderer) = setup(NullBackend::new(), ContextConfig::default());
        let stats = backend.stats();
        let comp = visible();

        ctx.attach_to(comp.clone());
        assert!(ctx.is_attached());
        assert!(ctx.raw_context().is_some());
        assert_eq!((ctx.width(), ctx.height()), (320, 240));
        wait_until("first frame", || renderer.count(Call::Render) > 0);

        ctx.detach();
        assert_eq!(ctx.state(), AttachmentState::Unattached);
        assert!(ctx.raw_context().is_none());
        assert_eq!(stats.live(), 0);
        assert_eq!(comp.listener_count(), 0);
        assert!(ctx.target_component().is_none());

        let frames = ctx.handle().frames_rendered();
        thread::sleep(Duration::from_millis(40));
        assert_eq!(ctx.handle().frames_rendered(), frames);

        // second detach is harmless
        ctx.detach();
    }

    #[test]
    fn callbacks_are_ordered() {
        let (mut ctx, _backend, renderer) = setup(NullBackend::new(), ContextConfig::default());
        ctx.attach_to(visible());
        wait_until("a few frames", || renderer.count(Call::Render) >= 3);
        ctx.detach();

        let calls = renderer.calls();
        assert_eq!(calls.first(), Some(&Call::Created));
        assert_eq!(calls.last(), Some(&Call::Closing));
        assert_eq!(renderer.count(Call::Created), 1);
        assert_eq!(renderer.count(Call::Closing), 1);
        assert!(renderer.closing_had_context.load(Ordering::SeqCst));
    }

    #[test]
    fn closing_skipped_where_platform_cannot_deliver_it() {
        let (mut ctx, backend, renderer) =
            setup(NullBackend::new().without_closing_notification(), ContextConfig::default());
        ctx.attach_to(visible());
        wait_until("first frame", || renderer.count(Call::Render) > 0);
        ctx.detach();

        assert_eq!(renderer.count(Call::Created), 1);
        assert_eq!(renderer.count(Call::Closing), 0);
        assert_eq!(backend.stats().live(), 0);
    }

    struct Caching {
        a: AssociatedObject,
        b: AssociatedObject,
        renders: AtomicUsize,
        checks: Mutex<Vec<(&'static str, bool)>>,
    }

    impl Caching {
        fn check(&self, what: &'static str, ok: bool) {
            self.checks.lock().unwrap().push((what, ok));
        }
    }

    impl Renderer for Caching {
        fn new_context_created(&self, ctx: &ContextHandle) {
            ctx.set_associated_object("program", Some(self.a.clone()));
        }

        fn render(&self, ctx: &ContextHandle) {
            if self.renders.fetch_add(1, Ordering::SeqCst) > 0 {
                return;
            }
            let got = ctx.associated_object("program");
            self.check("get returns stored", got.map_or(false, |o| Arc::ptr_eq(&o, &self.a)));

            ctx.set_associated_object("program", Some(self.b.clone()));
            self.check("replace releases previous", Arc::strong_count(&self.a) == 1);
            self.check("typed lookup", ctx.associated_object_as::<u32>("program").as_deref() == Some(&7));

            ctx.set_associated_object("scratch", Some(Arc::new("tmp") as AssociatedObject));
            ctx.set_associated_object("scratch", None);
            self.check("none clears", ctx.associated_object("scratch").is_none());
        }

        fn context_closing(&self, ctx: &ContextHandle) {
            self.check("still there when closing", ctx.associated_object("program").is_some());
        }
    }

    #[test]
    fn associated_objects_follow_the_native_context() {
        init_logger();
        let renderer = Arc::new(Caching {
            a: Arc::new(1u32),
            b: Arc::new(7u32),
            renders: AtomicUsize::new(0),
            checks: Mutex::new(Vec::new()),
        });
        let mut ctx = Context::new(Arc::new(NullBackend::new()));
        ctx.set_renderer(&renderer);

        ctx.attach_to(visible());
        wait_until("first frame", || renderer.renders.load(Ordering::SeqCst) > 0);
        ctx.detach();

        let checks = renderer.checks.lock().unwrap().clone();
        assert_eq!(checks.len(), 5);
        for (what, ok) in checks {
            assert!(ok, "{what}");
        }
        assert_eq!(Arc::strong_count(&renderer.b), 1);
    }

    struct Gated {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
        renders: AtomicUsize,
    }

    impl Renderer for Gated {
        fn new_context_created(&self, _ctx: &ContextHandle) {}

        fn render(&self, _ctx: &ContextHandle) {
            if self.renders.fetch_add(1, Ordering::SeqCst) == 0 {
                let _ = self.entered.lock().unwrap().send(());
                let _ = self.release.lock().unwrap().recv_timeout(Duration::from_secs(5));
            }
        }

        fn context_closing(&self, _ctx: &ContextHandle) {}
    }

    #[test]
    fn repaint_triggers_coalesce() {
        init_logger();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let renderer = Arc::new(Gated {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
            renders: AtomicUsize::new(0),
        });

        let config = ContextConfig::builder()
            .frame_rate(None)
            .component_painting(false)
            .build()
            .unwrap();
        let mut ctx = Context::with_config(Arc::new(NullBackend::new()), config);
        ctx.set_renderer(&renderer);
        ctx.attach_to(visible());

        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        for _ in 0..10 {
            ctx.trigger_repaint();
        }
        release_tx.send(()).unwrap();

        wait_until("the extra frame", || renderer.renders.load(Ordering::SeqCst) == 2);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 2);

        ctx.detach();
        // no-op once stopped
        ctx.trigger_repaint();
    }

    #[test]
    fn creation_deferred_until_visible_with_area() {
        let (mut ctx, backend, renderer) = setup(NullBackend::new(), ContextConfig::default());
        let stats = backend.stats();
        let comp = SimpleComponent::new(Bounds::default(), false);

        ctx.attach_to(comp.clone());
        assert_eq!(ctx.state(), AttachmentState::WaitingForVisibility);
        assert!(!ctx.is_attached());
        assert!(ctx.raw_context().is_none());

        comp.set_visible(true);
        assert_eq!(stats.created(), 0);
        assert_eq!(ctx.state(), AttachmentState::WaitingForVisibility);

        comp.set_bounds(Bounds::new(0, 0, 100, 80));
        assert_eq!(ctx.state(), AttachmentState::Running);
        assert_eq!(stats.created(), 1);
        assert_eq!((ctx.width(), ctx.height()), (100, 80));

        comp.set_bounds(Bounds::new(10, 10, 100, 80));
        wait_until("created callback", || renderer.count(Call::Created) == 1);
        assert_eq!(stats.created(), 1);
        ctx.detach();
    }

    #[test]
    fn failed_creation_retries_on_next_change() {
        let backend = NullBackend::new();
        backend.fail_next_creations(1);
        let (mut ctx, backend, renderer) = setup(backend, ContextConfig::default());
        let comp = visible();

        ctx.attach_to(comp.clone());
        assert_eq!(ctx.state(), AttachmentState::WaitingForVisibility);
        assert_eq!(backend.stats().failed(), 1);
        assert!(ctx.raw_context().is_none());

        comp.set_bounds(Bounds::new(0, 0, 200, 100));
        assert!(ctx.is_attached());
        assert_eq!(backend.stats().created(), 1);
        wait_until("first frame", || renderer.count(Call::Render) > 0);
        ctx.detach();
    }

    #[test]
    fn swap_interval_follows_driver_support() {
        let config = ContextConfig::builder().swap_interval(0).build().unwrap();
        let (mut ctx, _backend, renderer) = setup(NullBackend::new(), config.clone());
        assert_eq!(ctx.swap_interval(), 0);
        assert!(!ctx.set_swap_interval(1));

        ctx.attach_to(visible());
        wait_until("created callback", || renderer.count(Call::Created) == 1);
        assert_eq!(ctx.swap_interval(), 0);
        ctx.detach();

        let (mut ctx, _backend, renderer) =
            setup(NullBackend::new().with_capabilities(Capabilities::SHADERS), config);
        ctx.attach_to(visible());
        wait_until("created callback", || renderer.count(Call::Created) == 1);
        assert!(!ctx.set_swap_interval(0));
        assert_eq!(ctx.swap_interval(), 1);
        ctx.detach();
    }

    #[test]
    fn current_context_is_per_thread() {
        let (mut ctx, _backend, renderer) = setup(NullBackend::new(), ContextConfig::default());
        ctx.attach_to(visible());
        wait_until("a few frames", || renderer.count(Call::Render) >= 2);

        assert!(Context::current().is_none());
        assert!(!ctx.is_active());
        // owned by the render thread
        assert!(!ctx.make_active());
        assert!(thread::spawn(|| Context::current().is_none()).join().unwrap());

        ctx.detach();
        let matched = renderer.current_matched.lock().unwrap().clone();
        assert!(!matched.is_empty());
        assert!(matched.iter().all(|m| *m));
    }

    struct Releasing {
        results: Mutex<Vec<bool>>,
    }

    impl Renderer for Releasing {
        fn new_context_created(&self, _ctx: &ContextHandle) {}

        fn render(&self, ctx: &ContextHandle) {
            let was_active = ctx.is_active();
            Context::deactivate_current();
            let released = Context::current().is_none() && !ctx.is_active();
            self.results.lock().unwrap().push(was_active && released);
        }

        fn context_closing(&self, _ctx: &ContextHandle) {}
    }

    #[test]
    fn deactivate_current_releases_until_next_frame() {
        init_logger();
        let renderer = Arc::new(Releasing { results: Mutex::new(Vec::new()) });
        let mut ctx = Context::new(Arc::new(NullBackend::new()));
        ctx.set_renderer(&renderer);
        ctx.attach_to(visible());

        wait_until("two frames", || renderer.results.lock().unwrap().len() >= 2);
        ctx.detach();
        assert!(renderer.results.lock().unwrap().iter().all(|ok| *ok));
    }

    #[test]
    fn hiding_recreates_when_configured() {
        let config = ContextConfig::builder().recreate_on_hide(true).build().unwrap();
        let (mut ctx, backend, renderer) = setup(NullBackend::new(), config);
        let stats = backend.stats();
        let comp = visible();

        ctx.attach_to(comp.clone());
        wait_until("created callback", || renderer.count(Call::Created) == 1);

        comp.set_visible(false);
        assert_eq!(ctx.state(), AttachmentState::WaitingForVisibility);
        assert_eq!(stats.live(), 0);
        assert_eq!(renderer.count(Call::Closing), 1);

        comp.set_visible(true);
        assert!(ctx.is_attached());
        assert_eq!(stats.created(), 2);
        wait_until("second created callback", || renderer.count(Call::Created) == 2);
        ctx.detach();
    }

    #[test]
    fn hiding_keeps_context_otherwise() {
        let config = ContextConfig::builder().recreate_on_hide(false).build().unwrap();
        let (mut ctx, backend, _renderer) = setup(NullBackend::new(), config);
        let comp = visible();

        ctx.attach_to(comp.clone());
        comp.set_visible(false);
        assert!(ctx.is_attached());
        assert_eq!(backend.stats().live(), 1);
        ctx.detach();
    }

    #[test]
    fn resize_updates_surface_without_recreate() {
        let (mut ctx, backend, _renderer) = setup(NullBackend::new(), ContextConfig::default());
        let stats = backend.stats();
        let comp = visible();
        ctx.attach_to(comp.clone());

        let bounds = Bounds::new(0, 0, 640, 480);
        comp.set_bounds(bounds);
        assert_eq!((ctx.width(), ctx.height()), (640, 480));

        wait_until("bounds reach the surface", || stats.last_bounds() == Some(bounds));
        wait_until("repaint at new size", || comp.last_paint().map(|p| p.width) == Some(640));
        assert!(stats.bounds_updates() >= 1);
        assert_eq!(stats.created(), 1);
        ctx.detach();
    }

    #[test]
    fn reparenting_recreates() {
        let (mut ctx, backend, renderer) = setup(NullBackend::new(), ContextConfig::default());
        let comp = visible();
        ctx.attach_to(comp.clone());
        wait_until("created callback", || renderer.count(Call::Created) == 1);

        comp.reparent();
        assert!(ctx.is_attached());
        assert_eq!(backend.stats().created(), 2);
        assert_eq!(backend.stats().live(), 1);
        wait_until("second created callback", || renderer.count(Call::Created) == 2);
        ctx.detach();
    }

    struct Reparenting {
        component: Arc<SimpleComponent>,
        renders: AtomicUsize,
        created: AtomicUsize,
        closing: AtomicUsize,
        saw_previous_object: AtomicBool,
        markers: Mutex<Vec<Weak<dyn std::any::Any + Send + Sync>>>,
    }

    impl Renderer for Reparenting {
        fn new_context_created(&self, ctx: &ContextHandle) {
            if ctx.associated_object("marker").is_some() {
                self.saw_previous_object.store(true, Ordering::SeqCst);
            }
            let marker = Arc::new(self.created.load(Ordering::SeqCst)) as AssociatedObject;
            self.markers.lock().unwrap().push(Arc::downgrade(&marker));
            ctx.set_associated_object("marker", Some(marker));
            self.created.fetch_add(1, Ordering::SeqCst);
        }

        fn render(&self, _ctx: &ContextHandle) {
            if self.renders.fetch_add(1, Ordering::SeqCst) == 0 {
                self.component.reparent();
            }
        }

        fn context_closing(&self, _ctx: &ContextHandle) {
            self.closing.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn reparenting_from_render_callback_closes_old_context_first() {
        init_logger();
        let backend = Arc::new(NullBackend::new());
        let stats = backend.stats();
        let comp = visible();
        let renderer = Arc::new(Reparenting {
            component: comp.clone(),
            renders: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            closing: AtomicUsize::new(0),
            saw_previous_object: AtomicBool::new(false),
            markers: Mutex::new(Vec::new()),
        });
        let mut ctx = Context::new(backend.clone());
        ctx.set_renderer(&renderer);
        ctx.attach_to(comp.clone());

        wait_until("second created callback", || renderer.created.load(Ordering::SeqCst) == 2);
        // the old context finished its shutdown before the new one existed
        assert_eq!(renderer.closing.load(Ordering::SeqCst), 1);
        assert_eq!(stats.live(), 1);
        assert!(ctx.is_attached());

        ctx.detach();
        assert_eq!(renderer.closing.load(Ordering::SeqCst), 2);
        assert_eq!(stats.created(), 2);
        assert_eq!(stats.live(), 0);
        assert!(!renderer.saw_previous_object.load(Ordering::SeqCst));
        assert!(renderer.markers.lock().unwrap().iter().all(|m| m.strong_count() == 0));
        assert_eq!(comp.listener_count(), 0);
    }

    struct Resizing {
        component: Arc<SimpleComponent>,
        renders: AtomicUsize,
    }

    impl Renderer for Resizing {
        fn new_context_created(&self, _ctx: &ContextHandle) {}

        fn render(&self, _ctx: &ContextHandle) {
            let n = self.renders.fetch_add(1, Ordering::SeqCst);
            let width = if n % 2 == 0 { 320 } else { 330 };
            self.component.set_bounds(Bounds::new(0, 0, width, 240));
        }

        fn context_closing(&self, _ctx: &ContextHandle) {}
    }

    #[test]
    fn detach_while_render_callback_resizes_component() {
        init_logger();
        let backend = Arc::new(NullBackend::new());
        let comp = visible();
        let renderer = Arc::new(Resizing { component: comp.clone(), renders: AtomicUsize::new(0) });
        let (done_tx, done_rx) = mpsc::channel();

        let cycles = {
            let backend = backend.clone();
            let renderer = renderer.clone();
            let comp = comp.clone();
            thread::spawn(move || {
                let mut ctx = Context::new(backend);
                ctx.set_renderer(&renderer);
                for _ in 0..20 {
                    ctx.attach_to(comp.clone());
                    thread::sleep(Duration::from_millis(30));
                    ctx.detach();
                }
                let _ = done_tx.send(());
            })
        };

        done_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("attach/detach cycles did not finish");
        cycles.join().unwrap();

        assert!(renderer.renders.load(Ordering::SeqCst) > 0);
        assert_eq!(backend.stats().live(), 0);
        assert_eq!(comp.listener_count(), 0);
    }

    #[test]
    fn destroyed_component_tears_down() {
        let (mut ctx, backend, renderer) = setup(NullBackend::new(), ContextConfig::default());
        let comp = visible();
        ctx.attach_to(comp.clone());
        wait_until("first frame", || renderer.count(Call::Render) > 0);

        comp.destroy();
        assert_eq!(ctx.state(), AttachmentState::Unattached);
        assert!(ctx.target_component().is_none());
        assert_eq!(backend.stats().live(), 0);
        assert_eq!(renderer.count(Call::Closing), 1);

        ctx.detach();
    }

    #[test]
    fn configuration_is_frozen_while_attached() {
        let (mut ctx, _backend, first) = setup(NullBackend::new(), ContextConfig::default());
        ctx.attach_to(visible());

        ctx.set_pixel_format(PixelFormat::default().depth(24));
        ctx.set_component_painting_enabled(false);
        assert_eq!(ctx.config().pixel_format.depth_bits, 16);
        assert!(ctx.config().component_painting);

        let second = Arc::new(Recorder::default());
        ctx.set_renderer(&second);
        wait_until("a few frames", || first.count(Call::Render) >= 2);
        ctx.detach();

        assert!(second.calls().is_empty());
    }

    #[test]
    fn cleared_renderer_gets_no_more_callbacks() {
        let (mut ctx, _backend, renderer) = setup(NullBackend::new(), ContextConfig::default());
        ctx.attach_to(visible());
        wait_until("first frame", || renderer.count(Call::Render) > 0);

        ctx.clear_renderer();
        let renders = renderer.count(Call::Render);
        thread::sleep(Duration::from_millis(50));
        ctx.detach();

        assert!(renderer.count(Call::Render) <= renders + 1);
        assert_eq!(renderer.count(Call::Closing), 0);
    }

    #[test]
    fn dropped_renderer_is_not_kept_alive() {
        let (mut ctx, backend, renderer) = setup(NullBackend::new(), ContextConfig::default());
        ctx.attach_to(visible());
        wait_until("first frame", || renderer.count(Call::Render) > 0);

        let weak = Arc::downgrade(&renderer);
        drop(renderer);
        wait_until("renderer released", || weak.strong_count() == 0);
        ctx.detach();
        assert_eq!(backend.stats().live(), 0);
    }

    struct Blitter {
        drawn: Mutex<Vec<bool>>,
    }

    impl Renderer for Blitter {
        fn new_context_created(&self, _ctx: &ContextHandle) {}

        fn render(&self, ctx: &ContextHandle) {
            let ok = ctx.copy_texture(Bounds::with_size(100, 100), Bounds::new(10, 10, 50, 50), 200, 200);
            self.drawn.lock().unwrap().push(ok);
        }

        fn context_closing(&self, _ctx: &ContextHandle) {}
    }

    fn blit_with(backend: NullBackend) -> (Vec<DrawPath>, Vec<bool>) {
        init_logger();
        let backend = Arc::new(backend);
        let renderer = Arc::new(Blitter { drawn: Mutex::new(Vec::new()) });
        let mut ctx = Context::new(backend.clone());
        ctx.set_renderer(&renderer);
        ctx.attach_to(visible());

        wait_until("a blit", || !renderer.drawn.lock().unwrap().is_empty());
        assert!(!ctx.copy_texture(Bounds::with_size(100, 100), Bounds::with_size(10, 10), 200, 200));
        ctx.detach();

        let paths = backend.stats().draws().into_iter().map(|(_, path)| path).collect();
        let results = renderer.drawn.lock().unwrap().clone();
        (paths, results)
    }

    #[test]
    fn copy_texture_picks_draw_path() {
        let (paths, results) = blit_with(NullBackend::new());
        assert!(results.iter().all(|ok| *ok));
        assert!(!paths.is_empty());
        assert!(paths.iter().all(|p| *p == DrawPath::Shader));

        let (paths, _) = blit_with(NullBackend::new().with_capabilities(Capabilities::SWAP_CONTROL));
        assert!(!paths.is_empty());
        assert!(paths.iter().all(|p| *p == DrawPath::Legacy));
    }

    #[test]
    fn shaders_and_extensions_reflect_native_context() {
        let (mut ctx, _backend, renderer) = setup(NullBackend::new(), ContextConfig::default());
        assert!(!ctx.are_shaders_available());

        ctx.attach_to(visible());
        wait_until("created callback", || renderer.count(Call::Created) == 1);
        assert!(ctx.are_shaders_available());
        assert!(ctx.extensions().has_shader_functions());

        ctx.detach();
        assert!(!ctx.are_shaders_available());
        assert!(ctx.extensions().is_empty());
    }

    #[test]
    fn share_context_handle_is_passed_to_backend() {
        let (mut first, backend, _) = setup(NullBackend::new(), ContextConfig::default());
        first.attach_to(visible());

        let mut second = Context::new(backend.clone());
        second.set_context_to_share_with(Some(&first));
        second.attach_to(visible());

        assert!(first.raw_context().is_some());
        assert_eq!(backend.stats().last_share(), first.raw_context());

        second.detach();
        first.detach();
    }

    #[test]
    fn component_paint_pass_uses_frame_buffer() {
        let (mut ctx, _backend, _renderer) =
            setup(NullBackend::new().with_frame_buffer_id(7), ContextConfig::default());
        let comp = visible();
        ctx.attach_to(comp.clone());

        wait_until("paint pass", || comp.paint_count() > 0);
        assert_eq!(
            comp.last_paint().map(|p| (p.frame_buffer_id, p.width, p.height)),
            Some((7, 320, 240))
        );
        ctx.detach();
    }

    /// Renderer and component in one, logging the swap count each pass sees.
    struct FrameOrder {
        stats: Arc<NullStats>,
        log: Mutex<Vec<(&'static str, u64)>>,
    }

    impl FrameOrder {
        fn record(&self, what: &'static str) {
            self.log.lock().unwrap().push((what, self.stats.swaps()));
        }
    }

    impl Renderer for FrameOrder {
        fn new_context_created(&self, _ctx: &ContextHandle) {}

        fn render(&self, _ctx: &ContextHandle) {
            self.record("render");
        }

        fn context_closing(&self, _ctx: &ContextHandle) {}
    }

    impl Component for FrameOrder {
        fn bounds(&self) -> Bounds {
            Bounds::with_size(64, 64)
        }

        fn is_showing(&self) -> bool {
            true
        }

        fn add_listener(&self, _id: ListenerId, _listener: Weak<dyn ComponentListener>) {}

        fn remove_listener(&self, _id: ListenerId) {}

        fn paint_gl(&self, _target: &PaintTarget) {
            self.record("paint");
        }
    }

    #[test]
    fn frame_renders_then_paints_then_swaps() {
        init_logger();
        let backend = Arc::new(NullBackend::new());
        let order = Arc::new(FrameOrder { stats: backend.stats(), log: Mutex::new(Vec::new()) });
        let mut ctx = Context::new(backend.clone());
        ctx.set_renderer(&order);
        ctx.attach_to(order.clone());

        wait_until("a few frames", || order.log.lock().unwrap().len() >= 4);
        ctx.detach();

        let log = order.log.lock().unwrap().clone();
        assert_eq!(&log[..3], &[("render", 0), ("paint", 0), ("render", 1)]);
        assert_eq!(backend.stats().swaps(), ctx.handle().frames_rendered());
        assert!(ctx.handle().frames_rendered() >= 2);
    }

    #[test]
    fn attaching_twice_is_a_no_op() {
        let (mut ctx, backend, _renderer) = setup(NullBackend::new(), ContextConfig::default());
        let comp = visible();
        ctx.attach_to(comp.clone());
        ctx.attach_to(comp.clone());
        assert_eq!(backend.stats().created(), 1);

        ctx.attach_to(visible());
        assert_eq!(backend.stats().created(), 2);
        assert_eq!(backend.stats().live(), 1);
        assert_eq!(comp.listener_count(), 0);
        ctx.detach();
    }

    #[test]
    fn dropping_context_detaches() {
        let (mut ctx, backend, _renderer) = setup(NullBackend::new(), ContextConfig::default());
        ctx.attach_to(visible());
        assert_eq!(backend.stats().live(), 1);

        drop(ctx);
        assert_eq!(backend.stats().live(), 0);
    }
}
