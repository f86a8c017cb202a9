/// High-level response after a failed frame acquisition.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next tick.
    Reconfigured,
    /// Transient error; skip the current tick.
    SkipFrame,
    /// Unrecoverable (commonly OOM); the current run ends.
    Fatal,
}

/// Failure to create or keep a graphics context. Fatal to the current run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("presentation surface is unusable: {0}")]
    SurfaceUnusable(String),

    #[error("no usable configuration: {0}")]
    ConfigUnavailable(String),

    #[error("context creation rejected: {0}")]
    ContextRejected(String),

    #[error("presentation surface lost")]
    SurfaceLost,

    #[error("no graphics context is current")]
    NotCurrent,
}
