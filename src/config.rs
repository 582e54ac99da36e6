//! Context configuration.
//!
//! `ContextConfig` holds everything a [`Context`](crate::context::Context)
//! needs to know before it is attached: the surface format, whether the
//! target component's own painting goes through the GL context, and how the
//! render thread paces itself.
//!
//! The configuration is snapshotted when the context is attached. Changing it
//! afterwards has no effect on the running render thread.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use gosub_gl::config::ContextConfig;
//! let cfg = ContextConfig::default();
//! assert_eq!(cfg.frame_rate, Some(60));
//! assert!(cfg.component_painting);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use gosub_gl::config::ContextConfig;
//! use gosub_gl::pixel_format::PixelFormat;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ContextConfig::builder()
//!     .pixel_format(PixelFormat::default().depth(24).stencil(8))
//!     .component_painting(false)
//!     .frame_rate(None)      // only render on trigger_repaint()
//!     .swap_interval(1)
//!     .build()?;
//! # Ok(()) }
//! ```

use crate::errors::ConfigError;
use crate::pixel_format::PixelFormat;

const DEFAULT_FRAME_RATE: u32 = 60;
const DEFAULT_THREAD_NAME: &str = "gl-render";

/// Whether hiding the target component tears the native context down.
///
/// Some windowing systems lose the drawable when a window is unmapped, so the
/// context has to be rebuilt once the component is shown again.
pub const fn default_recreate_on_hide() -> bool {
    cfg!(any(target_os = "linux", target_os = "android"))
}

#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Surface format requested from the backend.
    pub pixel_format: PixelFormat,
    /// Run the component's 2D paint pass through the context after the renderer.
    pub component_painting: bool,
    /// Continuous redraw rate. `None` renders only when a repaint is triggered.
    pub frame_rate: Option<u32>,
    /// Swap interval applied after creation. `None` keeps the driver default.
    pub swap_interval: Option<u32>,
    /// Destroy the native context when the component is hidden.
    pub recreate_on_hide: bool,
    /// Prefix for the render thread name.
    pub thread_name: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::default(),
            component_painting: true,
            frame_rate: Some(DEFAULT_FRAME_RATE),
            swap_interval: None,
            recreate_on_hide: default_recreate_on_hide(),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl ContextConfig {
    pub fn builder() -> ContextConfigBuilder {
        ContextConfigBuilder::default()
    }

    /// Time budget for one frame when redrawing continuously.
    pub fn frame_interval(&self) -> Option<std::time::Duration> {
        self.frame_rate
            .map(|fps| std::time::Duration::from_nanos(1_000_000_000 / fps.max(1) as u64))
    }
}

/// Builder for [`ContextConfig`].
#[derive(Debug, Clone, Default)]
pub struct ContextConfigBuilder {
    inner: ContextConfig,
}

impl ContextConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut ContextConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn pixel_format(self, format: PixelFormat) -> Self { self.map(|c| c.pixel_format = format) }
    pub fn component_painting(self, on: bool) -> Self { self.map(|c| c.component_painting = on) }
    pub fn frame_rate(self, fps: Option<u32>) -> Self { self.map(|c| c.frame_rate = fps) }
    pub fn swap_interval(self, interval: u32) -> Self { self.map(|c| c.swap_interval = Some(interval)) }
    pub fn recreate_on_hide(self, on: bool) -> Self { self.map(|c| c.recreate_on_hide = on) }
    pub fn thread_name<S: Into<String>>(self, name: S) -> Self { self.map(|c| c.thread_name = name.into()) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut ContextConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<ContextConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

fn validate(c: &ContextConfig) -> Result<(), ConfigError> {
    if c.frame_rate == Some(0) {
        return Err(ConfigError::ZeroFrameRate);
    }
    let samples = c.pixel_format.multisampling_level;
    if samples != 0 && !samples.is_power_of_two() {
        return Err(ConfigError::InvalidMultisampling(samples));
    }
    if c.thread_name.trim().is_empty() {
        return Err(ConfigError::EmptyThreadName);
    }
    Ok(())
}
