use std::time::Instant;

use crate::device::{Backend, FramebufferId, TextureId};
use crate::geometry::Size;

/// One slot that made it into the composed frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ComposedSlot {
    pub slot: usize,
    pub framebuffer: FramebufferId,
    /// Offscreen color texture (unfiltered input, sampling transform applied).
    pub texture: TextureId,
    pub size: Size,
}

/// What a hook sees of the frame being composed.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedFrame {
    pub output_size: Size,
    pub frame_index: u64,
    pub tick_start: Instant,
    pub slots: Vec<ComposedSlot>,
}

/// Collaborator hook points inside a tick, e.g. for an encoder.
///
/// `after_offscreen` runs once every offscreen pass is recorded (pre-filter
/// content); `after_output` runs after the output filter pass and before
/// present. Reading pixels back is the hook's job. Both run on the render thread.
pub trait FrameHook<B: Backend>: Send {
    fn after_offscreen(&mut self, _backend: &mut B, _frame: &ComposedFrame) {}

    fn after_output(&mut self, _backend: &mut B, _frame: &ComposedFrame) {}
}
