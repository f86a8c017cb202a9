use std::sync::Arc;

use glam::Mat4;

use crate::device::{Backend, ContextError, TextureId, TextureUsage};
use crate::filter::FilterUnit;
use crate::geometry::Size;

use super::SlotShared;

/// Render-thread side of one input slot: its backing texture, native size,
/// last sampling transform and passthrough filter.
pub(crate) struct InputBinding<B: Backend> {
    slot: Arc<SlotShared>,
    texture: Option<(TextureId, Size)>,
    native_size: Size,
    transform: Mat4,
    passthrough: Box<dyn FilterUnit<B>>,
}

impl<B: Backend> InputBinding<B> {
    pub(crate) fn new(slot: Arc<SlotShared>, passthrough: Box<dyn FilterUnit<B>>) -> Self {
        Self {
            slot,
            texture: None,
            native_size: Size::ZERO,
            transform: Mat4::IDENTITY,
            passthrough,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<SlotShared> {
        &self.slot
    }

    pub(crate) fn native_size(&self) -> Size {
        self.native_size
    }

    /// Records the producer's native size. Returns true when it changed.
    pub(crate) fn set_native_size(&mut self, size: Size) -> bool {
        self.slot.set_buffer_size(size);
        if self.native_size == size {
            return false;
        }
        self.native_size = size;
        self.passthrough.set_output_size(size);
        true
    }

    pub(crate) fn texture(&self) -> Option<TextureId> {
        self.texture.map(|(id, _)| id)
    }

    pub(crate) fn transform(&self) -> Mat4 {
        self.transform
    }

    pub(crate) fn passthrough_mut(&mut self) -> &mut dyn FilterUnit<B> {
        self.passthrough.as_mut()
    }

    /// Moves a pending frame into the backing texture.
    ///
    /// The mailbox lock is released before any backend call. Returns whether
    /// a frame was ingested.
    pub(crate) fn ingest(&mut self, backend: &mut B) -> Result<bool, ContextError> {
        let Some(frame) = self.slot.take_pending() else {
            return Ok(false);
        };

        let size = frame.size();
        let id = match self.texture {
            Some((id, current)) if current == size => id,
            previous => {
                if let Some((old, _)) = previous {
                    backend.release_texture(old);
                    self.texture = None;
                }
                let id = backend.create_texture(size, TextureUsage::Input)?;
                self.texture = Some((id, size));
                log::debug!("slot {}: input texture {}x{}", self.slot.index(), size.width, size.height);
                id
            }
        };

        backend.write_texture(id, &frame);
        self.transform = frame.transform();
        Ok(true)
    }

    /// Drops GPU state ahead of a context teardown.
    pub(crate) fn release(&mut self, backend: &mut B) {
        self.passthrough.release(backend);
        if let Some((id, _)) = self.texture.take() {
            backend.release_texture(id);
        }
    }
}
