use slotmap::new_key_type;

use crate::filter::FilterUnit;
use crate::geometry::Size;
use crate::input::VideoFrame;

use super::{ContextError, SurfaceErrorAction};

new_key_type! {
    /// Color texture: an input slot's backing texture or a framebuffer color attachment.
    pub struct TextureId;
    /// Depth attachment of an offscreen framebuffer.
    pub struct DepthBufferId;
    /// Color + depth pairing that an offscreen pass renders into.
    pub struct FramebufferId;
}

/// Where a draw lands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RenderTarget {
    /// The frame acquired from the presentation surface this tick.
    Presentation,
    Offscreen(FramebufferId),
}

/// What a texture is used for; decides usage flags on real hardware.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextureUsage {
    /// Uploaded from the CPU and sampled.
    Input,
    /// Rendered into and sampled.
    RenderTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    Incomplete(String),
}

/// The GPU as seen from the render thread.
///
/// Implementations are owned by exactly one render thread at a time; no method
/// is ever called from a producer thread. Resource calls made while no context
/// is current fail with `ContextError::NotCurrent`.
pub trait Backend: Send + 'static {
    /// Host-supplied handle the context binds to (a window, or a test token).
    type Surface: Clone + Send + 'static;

    fn create_context(&mut self, surface: Self::Surface, size: Size) -> Result<(), ContextError>;

    fn make_current(&mut self) -> Result<(), ContextError>;

    /// Releases context, surface and device. Idempotent.
    fn destroy_context(&mut self);

    fn has_context(&self) -> bool;

    fn resize_surface(&mut self, size: Size);

    /// Acquires the presentation frame for this tick and opens command recording.
    fn begin_frame(&mut self) -> Result<(), SurfaceErrorAction>;

    /// Clears a target to `color` (straight RGBA).
    fn clear(&mut self, target: RenderTarget, color: [f32; 4]);

    /// Submits recorded work and swaps. No-op when no frame was begun.
    fn present(&mut self);

    fn create_texture(&mut self, size: Size, usage: TextureUsage) -> Result<TextureId, ContextError>;

    fn write_texture(&mut self, texture: TextureId, frame: &VideoFrame);

    fn release_texture(&mut self, texture: TextureId);

    fn create_depth_buffer(&mut self, size: Size) -> Result<DepthBufferId, ContextError>;

    fn release_depth_buffer(&mut self, depth: DepthBufferId);

    fn create_framebuffer(
        &mut self,
        color: TextureId,
        depth: DepthBufferId,
    ) -> Result<FramebufferId, ContextError>;

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus;

    fn release_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Driver errors collected since the last call.
    fn take_errors(&mut self) -> Vec<String>;

    /// A fresh no-op filter for moving an input into its offscreen surface.
    fn passthrough_filter(&self) -> Box<dyn FilterUnit<Self>>
    where
        Self: Sized;
}
