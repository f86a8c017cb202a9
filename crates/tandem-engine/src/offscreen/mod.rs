//! Offscreen surfaces: one color + depth + framebuffer triple per input slot.

mod framebuffer;

pub use framebuffer::{FramebufferArena, FramebufferError, FramebufferResource, PrepareOutcome};
