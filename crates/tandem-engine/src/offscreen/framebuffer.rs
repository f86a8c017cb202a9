use crate::device::{
    Backend, ContextError, DepthBufferId, FramebufferId, FramebufferStatus, TextureId, TextureUsage,
};
use crate::geometry::Size;

/// Slot-scoped framebuffer failure. Composition of that slot is skipped
/// until its size changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramebufferError {
    #[error("slot {slot}: framebuffer {width}x{height} is incomplete: {reason}")]
    Incomplete {
        slot: usize,
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("slot {slot}: {source}")]
    Context {
        slot: usize,
        #[source]
        source: ContextError,
    },
}

/// GPU objects backing one offscreen surface. All three are valid together
/// or none exists.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FramebufferResource {
    pub color: TextureId,
    pub depth: DepthBufferId,
    pub framebuffer: FramebufferId,
    pub size: Size,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// Already prepared at this size; handles unchanged.
    Unchanged,
    /// Previous objects (if any) released and new ones allocated.
    Allocated,
    /// Zero size or unknown slot; nothing allocated.
    NotReady,
    /// This size already failed; not retried until the size changes.
    Failed,
}

/// Offscreen surfaces indexed by input slot.
#[derive(Debug, Clone)]
pub struct FramebufferArena {
    slots: Vec<Option<FramebufferResource>>,
    failed: Vec<Option<Size>>,
}

impl FramebufferArena {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
            failed: vec![None; slot_count],
        }
    }

    pub fn get(&self, slot: usize) -> Option<&FramebufferResource> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn is_prepared(&self, slot: usize) -> bool {
        self.get(slot).is_some()
    }

    /// Ensures `slot` has a complete framebuffer of `size`.
    ///
    /// A different size first releases all three objects, then reallocates.
    /// An incomplete result is released immediately, so the slot never holds
    /// a partially valid resource.
    pub fn prepare<B: Backend>(
        &mut self,
        backend: &mut B,
        slot: usize,
        size: Size,
    ) -> Result<PrepareOutcome, FramebufferError> {
        if slot >= self.slots.len() || size.is_empty() {
            return Ok(PrepareOutcome::NotReady);
        }
        if self.slots[slot].is_some_and(|r| r.size == size) {
            return Ok(PrepareOutcome::Unchanged);
        }
        if self.failed[slot] == Some(size) {
            return Ok(PrepareOutcome::Failed);
        }

        self.release_slot(backend, slot);

        let context = |source| FramebufferError::Context { slot, source };

        let color = backend
            .create_texture(size, TextureUsage::RenderTarget)
            .map_err(context)?;
        let depth = match backend.create_depth_buffer(size) {
            Ok(depth) => depth,
            Err(e) => {
                backend.release_texture(color);
                return Err(context(e));
            }
        };
        let framebuffer = match backend.create_framebuffer(color, depth) {
            Ok(fb) => fb,
            Err(e) => {
                backend.release_depth_buffer(depth);
                backend.release_texture(color);
                return Err(context(e));
            }
        };

        if let FramebufferStatus::Incomplete(reason) = backend.framebuffer_status(framebuffer) {
            backend.release_framebuffer(framebuffer);
            backend.release_depth_buffer(depth);
            backend.release_texture(color);
            self.failed[slot] = Some(size);
            return Err(FramebufferError::Incomplete {
                slot,
                width: size.width,
                height: size.height,
                reason,
            });
        }

        self.failed[slot] = None;
        self.slots[slot] = Some(FramebufferResource {
            color,
            depth,
            framebuffer,
            size,
        });
        log::debug!("slot {slot}: offscreen surface {}x{}", size.width, size.height);
        Ok(PrepareOutcome::Allocated)
    }

    /// Releases `slot` and forgets any failed size, so the next prepare retries.
    pub fn invalidate<B: Backend>(&mut self, backend: &mut B, slot: usize) {
        self.release_slot(backend, slot);
        if let Some(failed) = self.failed.get_mut(slot) {
            *failed = None;
        }
    }

    pub fn release_all<B: Backend>(&mut self, backend: &mut B) {
        for slot in 0..self.slots.len() {
            self.invalidate(backend, slot);
        }
    }

    fn release_slot<B: Backend>(&mut self, backend: &mut B, slot: usize) {
        let Some(res) = self.slots.get_mut(slot).and_then(Option::take) else {
            return;
        };
        backend.release_framebuffer(res.framebuffer);
        backend.release_depth_buffer(res.depth);
        backend.release_texture(res.color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{HeadlessBackend, HeadlessSurface};

    fn live_backend() -> HeadlessBackend {
        let mut backend = HeadlessBackend::new();
        backend
            .create_context(HeadlessSurface::new(0), Size::new(64, 64))
            .unwrap();
        backend
    }

    // ── idempotence ───────────────────────────────────────────────────────

    #[test]
    fn same_size_is_noop() {
        let mut backend = live_backend();
        let probe = backend.probe();
        let mut arena = FramebufferArena::new(1);

        assert_eq!(arena.prepare(&mut backend, 0, Size::new(32, 16)), Ok(PrepareOutcome::Allocated));
        let first = *arena.get(0).unwrap();
        assert_eq!(arena.prepare(&mut backend, 0, Size::new(32, 16)), Ok(PrepareOutcome::Unchanged));
        assert_eq!(*arena.get(0).unwrap(), first);
        assert_eq!(probe.stats().framebuffers_created, 1);
    }

    #[test]
    fn resizes_release_everything_they_allocate() {
        let mut backend = live_backend();
        let probe = backend.probe();
        let mut arena = FramebufferArena::new(1);

        for n in 1..=10u32 {
            arena.prepare(&mut backend, 0, Size::new(n * 10, n * 5)).unwrap();
        }
        arena.release_all(&mut backend);

        let s = probe.stats();
        assert_eq!(s.framebuffers_created, 10);
        assert_eq!(s.framebuffers_released, 10);
        assert_eq!(s.textures_created, s.textures_released);
        assert_eq!(s.depth_buffers_created, s.depth_buffers_released);
    }

    #[test]
    fn zero_size_is_not_ready() {
        let mut backend = live_backend();
        let mut arena = FramebufferArena::new(1);
        assert_eq!(arena.prepare(&mut backend, 0, Size::new(0, 10)), Ok(PrepareOutcome::NotReady));
        assert_eq!(arena.prepare(&mut backend, 5, Size::new(4, 4)), Ok(PrepareOutcome::NotReady));
        assert!(!arena.is_prepared(0));
    }

    // ── incomplete ────────────────────────────────────────────────────────

    #[test]
    fn incomplete_releases_and_is_not_retried() {
        let mut backend = live_backend();
        let probe = backend.probe();
        probe.set_max_framebuffer_size(Some(Size::new(100, 100)));
        let mut arena = FramebufferArena::new(1);

        let err = arena.prepare(&mut backend, 0, Size::new(200, 50)).unwrap_err();
        assert!(matches!(err, FramebufferError::Incomplete { slot: 0, width: 200, height: 50, .. }));
        assert!(!arena.is_prepared(0));

        assert_eq!(arena.prepare(&mut backend, 0, Size::new(200, 50)), Ok(PrepareOutcome::Failed));

        let s = probe.stats();
        assert_eq!(s.framebuffers_created, 1);
        assert_eq!(s.framebuffers_released, 1);
        assert_eq!(s.textures_created, s.textures_released);

        // A new size is attempted again.
        assert_eq!(arena.prepare(&mut backend, 0, Size::new(50, 50)), Ok(PrepareOutcome::Allocated));
    }

    #[test]
    fn invalidate_forgets_failure() {
        let mut backend = live_backend();
        let probe = backend.probe();
        probe.set_max_framebuffer_size(Some(Size::new(10, 10)));
        let mut arena = FramebufferArena::new(1);

        assert!(arena.prepare(&mut backend, 0, Size::new(20, 20)).is_err());
        probe.set_max_framebuffer_size(None);
        arena.invalidate(&mut backend, 0);
        assert_eq!(arena.prepare(&mut backend, 0, Size::new(20, 20)), Ok(PrepareOutcome::Allocated));
    }

    #[test]
    fn no_context_is_a_context_error() {
        let mut backend = HeadlessBackend::new();
        let mut arena = FramebufferArena::new(1);
        let err = arena.prepare(&mut backend, 0, Size::new(8, 8)).unwrap_err();
        assert_eq!(err, FramebufferError::Context { slot: 0, source: ContextError::NotCurrent });
    }
}
