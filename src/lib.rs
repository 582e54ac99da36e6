pub mod component;
pub mod config;
pub mod context;
pub mod errors;
pub mod geometry;
pub mod pixel_format;
pub mod render;
pub mod renderer;

pub use context::{AttachmentState, Context, ContextHandle, ContextId};
pub use renderer::Renderer;
