//! GPU-free backend.
//!
//! Hands out slotmap handles, counts every allocation and release, and records
//! each filter draw. Behaviour can be scripted through the shared `HeadlessProbe`
//! while a compositor owns the backend on its render thread.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use slotmap::SlotMap;

use crate::filter::{DrawCall, FilterUnit};
use crate::geometry::{Quad, Size};
use crate::input::VideoFrame;

use super::{
    Backend, ContextError, DepthBufferId, FramebufferId, FramebufferStatus, RenderTarget,
    SurfaceErrorAction, TextureId, TextureUsage,
};

/// Stand-in presentation surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HeadlessSurface {
    pub id: u32,
}

impl HeadlessSurface {
    pub const fn new(id: u32) -> Self {
        Self { id }
    }
}

/// One filter draw as observed by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub filter: String,
    pub target: RenderTarget,
    pub texture: TextureId,
    pub quad: Quad,
    pub viewport: Size,
    /// Number of presents that happened before this draw.
    pub frame: u64,
}

/// Counters since the backend was created.
#[derive(Debug, Clone, Default)]
pub struct HeadlessStats {
    pub contexts_created: u64,
    pub contexts_destroyed: u64,
    pub live_contexts: u32,
    pub max_live_contexts: u32,
    /// Newest surfaces bound by context creation, oldest first.
    pub bound_surfaces: VecDeque<HeadlessSurface>,
    pub surface_size: Size,

    pub textures_created: u64,
    pub textures_released: u64,
    pub depth_buffers_created: u64,
    pub depth_buffers_released: u64,
    pub framebuffers_created: u64,
    pub framebuffers_released: u64,
    /// Handles still alive when their context was destroyed.
    pub leaked_at_teardown: u64,

    pub uploads: u64,
    pub clears: u64,
    pub frames_begun: u64,
    pub presents: u64,

    pub filter_initializations: u64,
    pub filter_releases: u64,
    /// Every draw ever recorded, including ones dropped from `draws`.
    pub draws_recorded: u64,
    /// Newest draws, oldest first, capped at the probe's history limit.
    pub draws: VecDeque<DrawRecord>,
}

impl HeadlessStats {
    /// Draws issued by filters into the presentation surface.
    pub fn presentation_draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.draws.iter().filter(|d| d.target == RenderTarget::Presentation)
    }
}

/// Records kept per history list unless the probe says otherwise.
const DEFAULT_HISTORY: usize = 4096;

#[derive(Default)]
struct ProbeState {
    stats: HeadlessStats,
    history: Option<usize>,
    fail_contexts: u32,
    context_delay: Duration,
    max_framebuffer: Option<Size>,
    frame_errors: VecDeque<SurfaceErrorAction>,
    driver_errors: Vec<String>,
}

/// Shared view into a `HeadlessBackend`, usable from any thread.
#[derive(Clone, Default)]
pub struct HeadlessProbe {
    inner: Arc<Mutex<ProbeState>>,
}

impl HeadlessProbe {
    pub fn stats(&self) -> HeadlessStats {
        self.inner.lock().stats.clone()
    }

    /// The next `count` context creations fail with `ContextRejected`.
    pub fn fail_next_contexts(&self, count: u32) {
        self.inner.lock().fail_contexts = count;
    }

    /// Every context creation sleeps this long first.
    pub fn set_context_delay(&self, delay: Duration) {
        self.inner.lock().context_delay = delay;
    }

    /// Framebuffers larger than `size` on either axis report incomplete.
    pub fn set_max_framebuffer_size(&self, size: Option<Size>) {
        self.inner.lock().max_framebuffer = size;
    }

    /// Queues a failure for an upcoming `begin_frame`.
    pub fn push_frame_error(&self, action: SurfaceErrorAction) {
        self.inner.lock().frame_errors.push_back(action);
    }

    /// Queues a driver error message for the next `take_errors`.
    pub fn push_driver_error(&self, message: impl Into<String>) {
        self.inner.lock().driver_errors.push(message.into());
    }

    /// Caps `draws` and `bound_surfaces` at the newest `limit` entries.
    pub fn set_history_limit(&self, limit: usize) {
        let mut state = self.inner.lock();
        state.history = Some(limit);
        let stats = &mut state.stats;
        truncate_front(&mut stats.draws, limit);
        truncate_front(&mut stats.bound_surfaces, limit);
    }

    fn with<R>(&self, f: impl FnOnce(&mut ProbeState) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl ProbeState {
    fn history_limit(&self) -> usize {
        self.history.unwrap_or(DEFAULT_HISTORY)
    }
}

fn push_capped<T>(list: &mut VecDeque<T>, item: T, limit: usize) {
    list.push_back(item);
    truncate_front(list, limit);
}

fn truncate_front<T>(list: &mut VecDeque<T>, limit: usize) {
    while list.len() > limit {
        list.pop_front();
    }
}

struct HeadlessFramebuffer {
    color: TextureId,
    depth: DepthBufferId,
}

/// Backend that performs no GPU work.
pub struct HeadlessBackend {
    probe: HeadlessProbe,
    context: Option<HeadlessSurface>,
    frame_open: bool,
    textures: SlotMap<TextureId, Size>,
    depth_buffers: SlotMap<DepthBufferId, Size>,
    framebuffers: SlotMap<FramebufferId, HeadlessFramebuffer>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            probe: HeadlessProbe::default(),
            context: None,
            frame_open: false,
            textures: SlotMap::with_key(),
            depth_buffers: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
        }
    }

    pub fn probe(&self) -> HeadlessProbe {
        self.probe.clone()
    }

    /// Records a filter draw. Called by `HeadlessFilter` and by custom test filters.
    pub fn record_draw(&mut self, filter: &str, call: &DrawCall) {
        self.probe.with(|p| {
            let record = DrawRecord {
                filter: filter.to_string(),
                target: call.target,
                texture: call.texture,
                quad: call.quad,
                viewport: call.viewport,
                frame: p.stats.presents,
            };
            let limit = p.history_limit();
            p.stats.draws_recorded += 1;
            push_capped(&mut p.stats.draws, record, limit);
        });
    }

    fn ensure_current(&self) -> Result<(), ContextError> {
        if self.context.is_some() {
            Ok(())
        } else {
            Err(ContextError::NotCurrent)
        }
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HeadlessBackend {
    type Surface = HeadlessSurface;

    fn create_context(&mut self, surface: HeadlessSurface, size: Size) -> Result<(), ContextError> {
        let delay = self.probe.with(|p| p.context_delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        self.probe.with(|p| {
            if p.fail_contexts > 0 {
                p.fail_contexts -= 1;
                return Err(ContextError::ContextRejected(format!(
                    "scripted failure on surface {}",
                    surface.id
                )));
            }

            p.stats.contexts_created += 1;
            p.stats.live_contexts += 1;
            p.stats.max_live_contexts = p.stats.max_live_contexts.max(p.stats.live_contexts);
            let limit = p.history_limit();
            push_capped(&mut p.stats.bound_surfaces, surface, limit);
            p.stats.surface_size = size;
            Ok(())
        })?;

        self.context = Some(surface);
        Ok(())
    }

    fn make_current(&mut self) -> Result<(), ContextError> {
        self.ensure_current()
    }

    fn destroy_context(&mut self) {
        if self.context.take().is_none() {
            return;
        }

        let leaked = (self.textures.len() + self.depth_buffers.len() + self.framebuffers.len()) as u64;
        self.textures.clear();
        self.depth_buffers.clear();
        self.framebuffers.clear();
        self.frame_open = false;

        self.probe.with(|p| {
            p.stats.contexts_destroyed += 1;
            p.stats.live_contexts = p.stats.live_contexts.saturating_sub(1);
            p.stats.leaked_at_teardown += leaked;
        });
    }

    fn has_context(&self) -> bool {
        self.context.is_some()
    }

    fn resize_surface(&mut self, size: Size) {
        self.probe.with(|p| p.stats.surface_size = size);
    }

    fn begin_frame(&mut self) -> Result<(), SurfaceErrorAction> {
        if self.context.is_none() {
            return Err(SurfaceErrorAction::Fatal);
        }
        if let Some(action) = self.probe.with(|p| p.frame_errors.pop_front()) {
            return Err(action);
        }
        self.frame_open = true;
        self.probe.with(|p| p.stats.frames_begun += 1);
        Ok(())
    }

    fn clear(&mut self, _target: RenderTarget, _color: [f32; 4]) {
        self.probe.with(|p| p.stats.clears += 1);
    }

    fn present(&mut self) {
        if !std::mem::take(&mut self.frame_open) {
            return;
        }
        self.probe.with(|p| p.stats.presents += 1);
    }

    fn create_texture(&mut self, size: Size, _usage: TextureUsage) -> Result<TextureId, ContextError> {
        self.ensure_current()?;
        let id = self.textures.insert(size);
        self.probe.with(|p| p.stats.textures_created += 1);
        Ok(id)
    }

    fn write_texture(&mut self, texture: TextureId, frame: &VideoFrame) {
        match self.textures.get(texture) {
            Some(size) if *size == frame.size() => {
                self.probe.with(|p| p.stats.uploads += 1);
            }
            Some(size) => self.probe.push_driver_error(format!(
                "upload of {:?} into texture of {size:?}",
                frame.size()
            )),
            None => self.probe.push_driver_error("upload into released texture"),
        }
    }

    fn release_texture(&mut self, texture: TextureId) {
        if self.textures.remove(texture).is_some() {
            self.probe.with(|p| p.stats.textures_released += 1);
        }
    }

    fn create_depth_buffer(&mut self, size: Size) -> Result<DepthBufferId, ContextError> {
        self.ensure_current()?;
        let id = self.depth_buffers.insert(size);
        self.probe.with(|p| p.stats.depth_buffers_created += 1);
        Ok(id)
    }

    fn release_depth_buffer(&mut self, depth: DepthBufferId) {
        if self.depth_buffers.remove(depth).is_some() {
            self.probe.with(|p| p.stats.depth_buffers_released += 1);
        }
    }

    fn create_framebuffer(
        &mut self,
        color: TextureId,
        depth: DepthBufferId,
    ) -> Result<FramebufferId, ContextError> {
        self.ensure_current()?;
        let id = self.framebuffers.insert(HeadlessFramebuffer { color, depth });
        self.probe.with(|p| p.stats.framebuffers_created += 1);
        Ok(id)
    }

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        let Some(fb) = self.framebuffers.get(framebuffer) else {
            return FramebufferStatus::Incomplete("unknown framebuffer".into());
        };
        let (Some(color), Some(depth)) = (self.textures.get(fb.color), self.depth_buffers.get(fb.depth)) else {
            return FramebufferStatus::Incomplete("missing attachment".into());
        };
        if color != depth {
            return FramebufferStatus::Incomplete("attachment sizes differ".into());
        }
        if let Some(max) = self.probe.with(|p| p.max_framebuffer) {
            if color.width > max.width || color.height > max.height {
                return FramebufferStatus::Incomplete(format!(
                    "{}x{} exceeds {}x{}",
                    color.width, color.height, max.width, max.height
                ));
            }
        }
        FramebufferStatus::Complete
    }

    fn release_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffers.remove(framebuffer).is_some() {
            self.probe.with(|p| p.stats.framebuffers_released += 1);
        }
    }

    fn take_errors(&mut self) -> Vec<String> {
        self.probe.with(|p| std::mem::take(&mut p.driver_errors))
    }

    fn passthrough_filter(&self) -> Box<dyn FilterUnit<Self>> {
        Box::new(HeadlessFilter::new("passthrough"))
    }
}

/// Filter that records its draws on the headless backend.
#[derive(Debug, Clone)]
pub struct HeadlessFilter {
    label: String,
    initialized: bool,
    output_size: Size,
}

impl HeadlessFilter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            initialized: false,
            output_size: Size::ZERO,
        }
    }

    pub fn output_size(&self) -> Size {
        self.output_size
    }
}

impl FilterUnit<HeadlessBackend> for HeadlessFilter {
    fn label(&self) -> &str {
        &self.label
    }

    fn initialize(&mut self, backend: &mut HeadlessBackend) -> anyhow::Result<()> {
        anyhow::ensure!(backend.has_context(), "no context to initialize `{}` on", self.label);
        self.initialized = true;
        backend.probe.with(|p| p.stats.filter_initializations += 1);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn set_output_size(&mut self, size: Size) {
        self.output_size = size;
    }

    fn draw(&mut self, backend: &mut HeadlessBackend, call: &DrawCall) -> anyhow::Result<()> {
        anyhow::ensure!(self.initialized, "filter `{}` drawn before initialize", self.label);
        backend.record_draw(&self.label, call);
        Ok(())
    }

    fn release(&mut self, backend: &mut HeadlessBackend) {
        if std::mem::take(&mut self.initialized) {
            backend.probe.with(|p| p.stats.filter_releases += 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;

    fn call() -> DrawCall {
        DrawCall {
            target: RenderTarget::Presentation,
            viewport: Size::new(4, 4),
            texture: TextureId::default(),
            quad: Quad::full_frame(),
            transform: Mat4::IDENTITY,
        }
    }

    // ── history ──

    #[test]
    fn draw_history_keeps_the_newest_records() {
        let mut backend = HeadlessBackend::new();
        let probe = backend.probe();
        probe.set_history_limit(3);

        for _ in 0..5 {
            backend.record_draw("old", &call());
        }
        backend.record_draw("new", &call());

        let s = probe.stats();
        assert_eq!(s.draws.len(), 3);
        assert_eq!(s.draws_recorded, 6);
        assert_eq!(s.draws.back().map(|d| d.filter.as_str()), Some("new"));
    }

    #[test]
    fn lowering_the_limit_trims_recorded_draws() {
        let mut backend = HeadlessBackend::new();
        let probe = backend.probe();
        for _ in 0..10 {
            backend.record_draw("a", &call());
        }
        assert_eq!(probe.stats().draws.len(), 10);

        probe.set_history_limit(2);
        let s = probe.stats();
        assert_eq!(s.draws.len(), 2);
        assert_eq!(s.draws_recorded, 10);
    }
}
