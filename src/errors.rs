/// Errors raised while bringing a native context up.
///
/// None of these cross the public lifecycle API: the attachment logs them and
/// stays eligible for another attempt on the next visibility or size change.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Native context creation failed: {0}")]
    CreationFailed(anyhow::Error),

    #[error("Could not spawn render thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("Target component is not showing or has no area")]
    NotVisible,
}

/// Validation errors returned by [`ContextConfigBuilder::build`](crate::config::ContextConfigBuilder::build).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("frame_rate must be at least 1 when set")]
    ZeroFrameRate,

    #[error("multisampling_level {0} must be 0 or a power of two")]
    InvalidMultisampling(u8),

    #[error("thread_name must not be empty")]
    EmptyThreadName,
}
