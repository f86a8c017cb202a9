/// Failure reported to a producer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProducerError {
    /// The compositor that owned the slot is gone.
    #[error("input slot has been released")]
    Released,

    /// The slot has no buffer size yet (no input size or output size reported).
    #[error("buffer size is not known yet")]
    SizeUnknown,

    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
