use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::current;
use super::handle::ContextHandle;
use super::repaint::Wake;
use super::shared::{ContextShared, ImageShared};
use crate::component::{Component, PaintTarget};
use crate::config::ContextConfig;
use crate::errors::ContextError;
use crate::geometry::Bounds;
use crate::render::{Capabilities, ExtensionFunctions, NativeContext};

/// Shortest wait between two continuous frames.
const MIN_FRAME_WAIT: Duration = Duration::from_millis(1);
/// Wait before retrying a native context that could not be made current.
const INIT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Render-loop settings snapshotted from the config at attach time.
#[derive(Debug, Clone)]
pub(crate) struct FrameSettings {
    pub component_painting: bool,
    pub frame_interval: Option<Duration>,
    pub swap_interval: Option<u32>,
    pub thread_name: String,
}

impl From<&ContextConfig> for FrameSettings {
    fn from(config: &ContextConfig) -> Self {
        Self {
            component_painting: config.component_painting,
            frame_interval: config.frame_interval(),
            swap_interval: config.swap_interval,
            thread_name: config.thread_name.clone(),
        }
    }
}

/// Run by the render thread as its very last step, after the native context
/// has been released.
pub(crate) type ExitHook = Box<dyn FnOnce(&Arc<ImageShared>) + Send>;

/// Owns the render thread of one native context.
///
/// Dropping (or [`stop`](Self::stop)ping) it finishes the frame in flight,
/// runs the shutdown sequence on the render thread and joins it.
pub(crate) struct CachedImage {
    shared: Arc<ContextShared>,
    image: Arc<ImageShared>,
    thread: Option<JoinHandle<()>>,
}

impl CachedImage {
    /// Hands `native` to a freshly spawned render thread and publishes it as
    /// the context's current native context.
    pub(crate) fn start(
        shared: Arc<ContextShared>,
        native: Box<dyn NativeContext>,
        component: Arc<dyn Component>,
        settings: FrameSettings,
        on_exit: ExitHook,
    ) -> Result<Self, ContextError> {
        let image = Arc::new(ImageShared::new(native));
        let name = format!("{}-{}", settings.thread_name, shared.id);
        let worker = RenderWorker {
            handle: ContextHandle::bound(shared.clone(), image.clone()),
            image: image.clone(),
            component,
            settings,
            initialised: false,
            on_exit: Some(on_exit),
        };

        match thread::Builder::new().name(name).spawn(move || worker.run()) {
            Ok(thread) => {
                shared.set_image(image.clone());
                Ok(Self {
                    shared,
                    image,
                    thread: Some(thread),
                })
            }
            Err(e) => {
                drop(image.take_native());
                Err(ContextError::ThreadSpawn(e))
            }
        }
    }

    pub(crate) fn post_bounds(&self, bounds: Bounds) {
        self.image.post_bounds(bounds);
    }

    pub(crate) fn invalidate_paint(&self) {
        self.image.invalidate_paint();
    }

    pub(crate) fn is(&self, image: &Arc<ImageShared>) -> bool {
        Arc::ptr_eq(&self.image, image)
    }

    /// True when called from this image's own render thread.
    pub(crate) fn is_render_thread(&self) -> bool {
        self.thread
            .as_ref()
            .map_or(false, |t| t.thread().id() == thread::current().id())
    }

    /// Tells the render thread to shut down after the frame in flight and
    /// unpublishes the native context. Does not wait.
    pub(crate) fn request_stop(&self) {
        self.image.repaint.stop();
        self.shared.clear_image(&self.image);
    }

    /// Stops and joins the render thread. Blocks until the native context has
    /// been released. From the render thread itself this only requests the stop.
    pub(crate) fn stop(&mut self) {
        self.request_stop();

        if self.is_render_thread() {
            log::debug!("Context[{}]: stop requested from its own render thread", self.shared.id);
            self.thread = None;
            return;
        }
        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.join().is_err() {
            log::error!("Context[{}]: render thread panicked", self.shared.id);
            // The shutdown sequence never ran; release what is left here.
            self.image.associated.clear();
            drop(self.image.take_native());
        }
    }
}

impl Drop for CachedImage {
    fn drop(&mut self) {
        self.stop();
    }
}

struct RenderWorker {
    handle: ContextHandle,
    image: Arc<ImageShared>,
    component: Arc<dyn Component>,
    settings: FrameSettings,
    initialised: bool,
    on_exit: Option<ExitHook>,
}

impl RenderWorker {
    fn shared(&self) -> &ContextShared {
        self.handle.shared()
    }

    fn run(mut self) {
        log::debug!("Context[{}]: render thread started", self.shared().id);

        while !self.image.repaint.is_stopping() {
            if !self.initialised && !self.initialise() {
                if self.image.repaint.wait(Some(INIT_RETRY_DELAY)) == Wake::Stop {
                    break;
                }
                continue;
            }

            let started = Instant::now();
            self.render_frame();

            let timeout = self
                .settings
                .frame_interval
                .map(|interval| interval.saturating_sub(started.elapsed()).max(MIN_FRAME_WAIT));
            if self.image.repaint.wait(timeout) == Wake::Stop {
                break;
            }
        }

        self.shutdown();

        if let Some(on_exit) = self.on_exit.take() {
            on_exit(&self.image);
        }
    }

    fn initialise(&mut self) -> bool {
        if !self.handle.make_active() {
            log::warn!("Context[{}]: could not make native context current, retrying", self.shared().id);
            return false;
        }

        let resolved = self
            .image
            .with_native(|n| (ExtensionFunctions::resolve(n), n.capabilities()));
        let Some((extensions, capabilities)) = resolved else {
            return false;
        };

        let shaders = capabilities.contains(Capabilities::SHADERS) && extensions.has_shader_functions();
        log::debug!(
            "Context[{}]: resolved {} entry points, capabilities {:?}",
            self.shared().id,
            extensions.len(),
            capabilities
        );
        self.image.set_extensions(extensions, shaders);

        if let Some(interval) = self.settings.swap_interval {
            if !self.handle.set_swap_interval(interval) {
                log::info!(
                    "Context[{}]: swap interval {} not supported, keeping {}",
                    self.shared().id,
                    interval,
                    self.handle.swap_interval()
                );
            }
        }

        if let Some(renderer) = self.shared().renderer() {
            renderer.new_context_created(&self.handle);
        }

        self.initialised = true;
        true
    }

    fn render_frame(&mut self) {
        if !self.handle.make_active() {
            log::warn!("Context[{}]: could not make native context current, skipping frame", self.shared().id);
            return;
        }

        if let Some(bounds) = self.image.take_pending_bounds() {
            self.image.with_native(|n| n.update_bounds(bounds));
            self.image.mark_paint_dirty();
        }

        if let Some(renderer) = self.shared().renderer() {
            renderer.render(&self.handle);
        }

        if self.settings.component_painting && self.image.take_paint_dirty() {
            let target = PaintTarget {
                frame_buffer_id: self.handle.frame_buffer_id(),
                width: self.handle.width(),
                height: self.handle.height(),
            };
            self.component.paint_gl(&target);
        }

        self.handle.swap_buffers();
        self.shared().count_frame();
    }

    fn shutdown(&self) {
        let shared = self.shared();
        let active = self.handle.make_active();

        if self.initialised {
            let notifies = self.image.with_native(|n| n.notifies_closing()).unwrap_or(false);
            match shared.renderer() {
                Some(renderer) if notifies && active => renderer.context_closing(&self.handle),
                Some(_) => log::debug!("Context[{}]: closing callback skipped", shared.id),
                None => {}
            }
        }

        let released = self.image.associated.clear();
        self.image.set_extensions(ExtensionFunctions::default(), false);

        if let Some(mut native) = self.image.take_native() {
            native.release_current();
            drop(native);
        }
        current::clear_if_image(&self.image);

        log::info!(
            "Context[{}]: native context released after {} frames ({} associated objects)",
            shared.id,
            shared.frames(),
            released
        );
    }
}
