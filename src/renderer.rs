use crate::context::ContextHandle;

/// Client code that draws with a [`Context`](crate::context::Context).
///
/// Every callback runs on the context's render thread with the native context
/// current, so implementations must be thread-safe with respect to whatever
/// else touches their state. The context only keeps a weak reference to its
/// renderer: dropping the last `Arc` stops the callbacks.
///
/// Order per native context: `new_context_created` once, then any number of
/// `render` calls, then `context_closing` once. The closing callback is skipped
/// on platforms whose native context reports that it cannot deliver it.
pub trait Renderer: Send + Sync {
    /// A new native context is ready. Create textures, shaders and buffers here.
    fn new_context_created(&self, context: &ContextHandle);

    /// Draw the next frame.
    fn render(&self, context: &ContextHandle);

    /// The native context is about to be destroyed. Release GL resources here.
    fn context_closing(&self, context: &ContextHandle);
}
