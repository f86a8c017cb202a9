use crate::device::ContextError;

/// Errors returned by the `Compositor` host API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositorError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("slot {slot} is out of range (compositor has {count} slots)")]
    SlotOutOfRange { slot: usize, count: usize },

    /// `stop` would join the calling thread.
    #[error("the render thread cannot stop itself synchronously; use request_stop")]
    OnRenderThread,

    #[error("failed to spawn the render thread: {0}")]
    ThreadSpawn(String),

    #[error("the render thread panicked")]
    RenderThreadPanicked,
}
