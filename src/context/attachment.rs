use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::cached_image::{CachedImage, ExitHook, FrameSettings};
use super::shared::{ContextShared, ImageShared};
use crate::component::{is_renderable, Component, ComponentEvent, ComponentListener, ListenerId};
use crate::config::ContextConfig;
use crate::errors::ContextError;
use crate::render::{ContextRequest, GpuBackend};

/// Where an attached context is in its life.
///
/// `Creating` is only held while the attachment is busy. `Destroying` lasts
/// until the old render thread has exited; component events that arrive in
/// the meantime are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    /// Not attached to any component.
    Unattached,
    /// Attached, but the component is hidden, has no area, or creation failed.
    WaitingForVisibility,
    /// Native context and render thread are being brought up.
    Creating,
    /// Render thread running.
    Running,
    /// Render thread and native context are being torn down.
    Destroying,
}

struct AttachmentInner {
    state: AttachmentState,
    component: Option<Arc<dyn Component>>,
    image: Option<CachedImage>,
    /// Image whose teardown was requested from its own render thread. It
    /// finishes shutting down on that thread, then reports back.
    retiring: Option<CachedImage>,
}

/// Follows a component and keeps a native context alive while it can be
/// rendered into.
///
/// The `inner` lock is never held while joining a render thread: renderer or
/// paint code may make the component emit events, and those land here.
pub(crate) struct Attachment {
    this: Weak<Attachment>,
    id: ListenerId,
    shared: Arc<ContextShared>,
    backend: Arc<dyn GpuBackend>,
    config: ContextConfig,
    share_with: Option<Weak<ContextShared>>,
    inner: Mutex<AttachmentInner>,
}

impl Attachment {
    /// Starts following `component`. Creates the native context right away
    /// when the component is showing and has area.
    pub(crate) fn attach(
        shared: Arc<ContextShared>,
        backend: Arc<dyn GpuBackend>,
        config: ContextConfig,
        share_with: Option<Weak<ContextShared>>,
        component: Arc<dyn Component>,
    ) -> Arc<Self> {
        let attachment = Arc::new_cyclic(|this| Self {
            this: this.clone(),
            id: ListenerId::new(),
            shared,
            backend,
            config,
            share_with,
            inner: Mutex::new(AttachmentInner {
                state: AttachmentState::Unattached,
                component: Some(component.clone()),
                image: None,
                retiring: None,
            }),
        });

        let listener = attachment.this.clone() as Weak<dyn ComponentListener>;
        component.add_listener(attachment.id, listener);

        attachment.try_create(&mut attachment.lock());
        attachment
    }

    fn lock(&self) -> MutexGuard<'_, AttachmentInner> {
        self.inner.lock().unwrap()
    }

    pub(crate) fn state(&self) -> AttachmentState {
        self.lock().state
    }

    pub(crate) fn component(&self) -> Option<Arc<dyn Component>> {
        self.lock().component.clone()
    }

    /// Stops following the component. Blocks until every render thread of
    /// this attachment has exited.
    pub(crate) fn detach(&self) {
        let (image, retiring, component) = {
            let mut inner = self.lock();
            let image = self.begin_teardown(&mut inner);
            inner.state = AttachmentState::Destroying;
            (image, inner.retiring.take(), inner.component.take())
        };

        if let Some(component) = &component {
            component.remove_listener(self.id);
        }
        drop(image);
        drop(retiring);

        self.lock().state = AttachmentState::Unattached;
        if component.is_some() {
            log::debug!("Context[{}]: detached", self.shared.id);
        }
    }

    fn try_create(&self, inner: &mut AttachmentInner) {
        let Some(component) = inner.component.clone() else {
            return;
        };

        if !is_renderable(component.as_ref()) {
            log::debug!(
                "Context[{}]: {}, waiting for visibility",
                self.shared.id,
                ContextError::NotVisible
            );
            inner.state = AttachmentState::WaitingForVisibility;
            return;
        }

        inner.state = AttachmentState::Creating;
        match self.create_image(&component) {
            Ok(image) => {
                inner.image = Some(image);
                inner.state = AttachmentState::Running;
                log::info!(
                    "Context[{}]: running on {} ({}x{})",
                    self.shared.id,
                    self.backend.name(),
                    self.shared.width(),
                    self.shared.height()
                );
            }
            Err(e) => {
                log::warn!("Context[{}]: {}, will retry on the next component change", self.shared.id, e);
                inner.state = AttachmentState::WaitingForVisibility;
            }
        }
    }

    fn create_image(&self, component: &Arc<dyn Component>) -> Result<CachedImage, ContextError> {
        let bounds = component.bounds();

        let share_with = match &self.share_with {
            Some(other) => {
                let raw = other
                    .upgrade()
                    .and_then(|other| other.image())
                    .and_then(|image| image.raw_context());
                if raw.is_none() {
                    log::warn!("Context[{}]: share context has no native context, creating unshared", self.shared.id);
                }
                raw
            }
            None => None,
        };

        let label = format!("Context[{}]", self.shared.id);
        let request = ContextRequest {
            pixel_format: self.config.pixel_format,
            share_with,
            bounds,
            window: component.raw_window_handle(),
            label: &label,
        };

        let native = self
            .backend
            .create_context(&request)
            .map_err(ContextError::CreationFailed)?;

        let this = self.this.clone();
        let on_exit: ExitHook = Box::new(move |image| {
            if let Some(attachment) = this.upgrade() {
                attachment.render_thread_exited(image);
            }
        });

        self.shared.set_size(bounds.width, bounds.height);
        CachedImage::start(
            self.shared.clone(),
            native,
            component.clone(),
            FrameSettings::from(&self.config),
            on_exit,
        )
    }

    /// Takes the running image out and tells it to stop. The caller joins it
    /// once `inner` is unlocked.
    fn begin_teardown(&self, inner: &mut AttachmentInner) -> Option<CachedImage> {
        let image = inner.image.take()?;
        inner.state = AttachmentState::Destroying;
        image.request_stop();
        Some(image)
    }

    /// Finishes a teardown started by `begin_teardown`, then looks at the
    /// component again and recreates the native context if it can.
    fn recreate_after(&self, image: CachedImage) {
        if image.is_render_thread() {
            // Cannot join ourselves. The render thread reports back through
            // `render_thread_exited` once its shutdown has run.
            self.lock().retiring = Some(image);
            return;
        }

        drop(image);
        let mut inner = self.lock();
        if inner.state == AttachmentState::Destroying {
            self.try_create(&mut inner);
        }
    }

    fn render_thread_exited(&self, image: &Arc<ImageShared>) {
        let mut inner = self.lock();
        if !inner.retiring.as_ref().map_or(false, |r| r.is(image)) {
            return;
        }
        let retiring = inner.retiring.take();
        if inner.state == AttachmentState::Destroying {
            self.try_create(&mut inner);
        }
        drop(inner);
        drop(retiring);
    }
}

impl ComponentListener for Attachment {
    fn component_event(&self, event: ComponentEvent) {
        use AttachmentState::*;
        use ComponentEvent::*;

        let mut inner = self.lock();
        let Some(component) = inner.component.clone() else {
            return;
        };

        match (inner.state, event) {
            (Destroying, _) => {}

            (_, Destroyed) => {
                drop(inner);
                self.detach();
                log::debug!("Context[{}]: target component destroyed", self.shared.id);
            }

            (WaitingForVisibility, VisibilityChanged | Resized | Moved | ParentChanged) => {
                self.try_create(&mut inner);
            }

            (Running, VisibilityChanged) => {
                if !component.is_showing() && self.config.recreate_on_hide {
                    let image = self.begin_teardown(&mut inner);
                    drop(inner);
                    if let Some(image) = image {
                        self.recreate_after(image);
                    }
                } else if let Some(image) = &inner.image {
                    image.invalidate_paint();
                }
            }

            (Running, Resized) => {
                let bounds = component.bounds();
                self.shared.set_size(bounds.width, bounds.height);
                if let Some(image) = &inner.image {
                    image.post_bounds(bounds);
                }
            }

            (Running, Moved) => {
                if let Some(image) = &inner.image {
                    image.post_bounds(component.bounds());
                }
            }

            (Running, ParentChanged) => {
                let image = self.begin_teardown(&mut inner);
                drop(inner);
                if let Some(image) = image {
                    self.recreate_after(image);
                }
            }

            (Running, Invalidated) => {
                if let Some(image) = &inner.image {
                    image.invalidate_paint();
                }
            }

            _ => {}
        }
    }
}
