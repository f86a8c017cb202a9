//! Input slots.
//!
//! Producer threads own `ProducerSurface` handles and write frames into a
//! single-frame mailbox per slot. The render thread drains each mailbox at
//! most once per tick through its `InputBinding`.

mod binding;
mod error;
mod frame;
mod slot;

pub(crate) use binding::InputBinding;
pub(crate) use slot::SlotShared;

pub use error::ProducerError;
pub use frame::VideoFrame;
pub use slot::ProducerSurface;
