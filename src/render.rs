pub mod backend;
pub mod extensions;
pub mod texture;

/// Native context backends.
pub mod backends {
    /// Headless backend, used when no GPU is around (and in tests).
    pub mod null;
}

pub use backend::{Capabilities, ContextRequest, GpuBackend, NativeContext, ProcAddress, RawContext};
pub use extensions::ExtensionFunctions;
pub use texture::{DrawPath, TextureQuad};
