use std::sync::Arc;
use std::time::Instant;

use glam::Mat4;

use crate::device::{Backend, ContextError, GraphicsContext, RenderTarget, SurfaceErrorAction};
use crate::filter::{DrawCall, FilterUnit, SharedFilter, ensure_ready};
use crate::geometry::{Quad, Size};
use crate::input::{InputBinding, SlotShared};
use crate::layout::{LayoutConfig, LayoutResolver, SlotLayout, SlotRegion};
use crate::offscreen::{FramebufferArena, FramebufferError, FramebufferResource};
use crate::time::{FpsCounter, FrameClock, FrameTime};

use super::hook::{ComposedFrame, ComposedSlot, FrameHook};
use super::{CompositorConfig, LoopStats};

const TRANSPARENT: [f32; 4] = [0.0; 4];

/// What one tick ended up doing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// No slot had both content and a framebuffer.
    Idle,
    /// Frame acquisition failed; nothing was drawn.
    Skipped,
    Presented,
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct TickReport {
    pub(crate) time: FrameTime,
    pub(crate) outcome: TickOutcome,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    ticks: u64,
    presented: u64,
    skipped: u64,
    framebuffer_failures: u64,
    driver_errors: u64,
}

/// Everything the render thread owns.
///
/// Tasks scheduled with `Compositor::run_before_draw` and `run_after_draw`
/// receive it by mutable reference; it never leaves the render thread while a
/// run is active.
pub struct Pipeline<B: Backend> {
    context: GraphicsContext<B>,
    bindings: Vec<InputBinding<B>>,
    framebuffers: FramebufferArena,
    layout: LayoutConfig,
    resolver: LayoutResolver,
    default_output: Box<dyn FilterUnit<B>>,
    output_filter: Option<SharedFilter<B>>,
    /// Set while the installed output filter cannot initialize.
    output_fallback: bool,
    hook: Option<Box<dyn FrameHook<B>>>,
    output_size: Size,
    clear_color: [f32; 4],
    clock: FrameClock,
    fps: FpsCounter,
    counters: Counters,
    last_tick_start: Option<Instant>,
}

impl<B: Backend> Pipeline<B> {
    pub(crate) fn new(
        backend: B,
        surface: B::Surface,
        slots: &[Arc<SlotShared>],
        config: &CompositorConfig,
    ) -> Self {
        let bindings = slots
            .iter()
            .map(|slot| InputBinding::new(slot.clone(), backend.passthrough_filter()))
            .collect();
        let default_output = backend.passthrough_filter();

        Self {
            context: GraphicsContext::new(backend, surface),
            bindings,
            framebuffers: FramebufferArena::new(slots.len()),
            layout: LayoutConfig::new(slots.len()),
            resolver: LayoutResolver::new(slots.len()),
            default_output,
            output_filter: None,
            output_fallback: false,
            hook: None,
            output_size: config.initial_output_size,
            clear_color: config.clear_color,
            clock: FrameClock::new(config.target_frame_interval),
            fps: FpsCounter::new(),
            counters: Counters::default(),
            last_tick_start: None,
        }
    }

    pub fn backend(&self) -> &B {
        self.context.backend()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.context.backend_mut()
    }

    pub fn is_live(&self) -> bool {
        self.context.is_live()
    }

    pub fn output_size(&self) -> Size {
        self.output_size
    }

    pub fn slot_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Last resolved quad for `slot`.
    pub fn quad(&self, slot: usize) -> Option<&Quad> {
        self.resolver.quad(slot)
    }

    pub fn framebuffer(&self, slot: usize) -> Option<&FramebufferResource> {
        self.framebuffers.get(slot)
    }

    pub fn input_size(&self, slot: usize) -> Option<Size> {
        self.bindings.get(slot).map(InputBinding::native_size)
    }

    // ── configuration (render thread) ─────────────────────────────────────

    pub(crate) fn rebind(&mut self, surface: B::Surface) {
        self.context.rebind(surface);
    }

    pub(crate) fn set_output_size(&mut self, size: Size) {
        if size == self.output_size {
            return;
        }
        self.output_size = size;
        self.context.resize(size);
        self.default_output.set_output_size(size);
        if let Some(filter) = &self.output_filter {
            filter.lock().set_output_size(size);
        }

        let backend = self.context.backend_mut();
        for (slot, binding) in self.bindings.iter_mut().enumerate() {
            if binding.shared().follows_output() && binding.set_native_size(size) {
                self.framebuffers.invalidate(backend, slot);
            }
        }
        self.resolver.mark_dirty();
    }

    pub(crate) fn set_input_size(&mut self, slot: usize, size: Size) {
        let Some(binding) = self.bindings.get_mut(slot) else {
            return;
        };
        if binding.set_native_size(size) {
            self.framebuffers.invalidate(self.context.backend_mut(), slot);
            self.resolver.mark_dirty();
        }
    }

    /// Turns `slot` into a full-frame overlay sized to the output.
    pub(crate) fn attach_overlay(&mut self, slot: usize) {
        let Some(binding) = self.bindings.get_mut(slot) else {
            return;
        };
        binding.shared().set_follows_output(true);
        if binding.set_native_size(self.output_size) {
            self.framebuffers.invalidate(self.context.backend_mut(), slot);
        }
        if let Some(layout) = self.layout.slots.get_mut(slot) {
            layout.region = SlotRegion::FullFrame;
        }
        self.resolver.mark_dirty();
    }

    pub(crate) fn set_layout(&mut self, mut layout: LayoutConfig) {
        // Slot count is fixed; overlays keep their full-frame region.
        layout.slots.resize(self.bindings.len(), SlotLayout::default());
        for (binding, slot) in self.bindings.iter().zip(layout.slots.iter_mut()) {
            if binding.shared().follows_output() {
                slot.region = SlotRegion::FullFrame;
            }
        }
        self.layout = layout;
        self.resolver.mark_dirty();
    }

    pub(crate) fn update_layout(&mut self, update: impl FnOnce(&mut LayoutConfig)) {
        let mut layout = self.layout.clone();
        update(&mut layout);
        self.set_layout(layout);
    }

    /// Installs the output filter, releasing the previous one.
    pub(crate) fn set_output_filter(&mut self, filter: Option<SharedFilter<B>>) {
        let backend = self.context.backend_mut();
        if let Some(old) = self.output_filter.take() {
            let replaced_by_same = filter.as_ref().is_some_and(|new| Arc::ptr_eq(&old, new));
            if !replaced_by_same {
                old.lock().release(backend);
            }
        }

        if let Some(new) = &filter {
            let mut guard = new.lock();
            guard.set_output_size(self.output_size);
            if self.context.is_live() {
                if let Err(e) = ensure_ready(&mut *guard, self.context.backend_mut(), self.output_size) {
                    log::warn!("output filter `{}` failed to initialize: {e:#}", guard.label());
                }
            }
        }
        self.output_filter = filter;
        self.output_fallback = false;
    }

    pub(crate) fn set_hook(&mut self, hook: Option<Box<dyn FrameHook<B>>>) {
        self.hook = hook;
    }

    pub(crate) fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Creates the context and every filter's GPU state.
    ///
    /// On error the caller tears down; partially created state is released there.
    pub(crate) fn start_run(&mut self) -> Result<(), ContextError> {
        self.context.initialize(self.output_size)?;

        let backend = self.context.backend_mut();
        for binding in &mut self.bindings {
            let size = binding.native_size();
            ensure_ready(binding.passthrough_mut(), backend, size)
                .map_err(|e| ContextError::ConfigUnavailable(format!("passthrough filter: {e:#}")))?;
        }
        ensure_ready(self.default_output.as_mut(), backend, self.output_size)
            .map_err(|e| ContextError::ConfigUnavailable(format!("output filter: {e:#}")))?;

        if let Some(filter) = &self.output_filter {
            let mut guard = filter.lock();
            if let Err(e) = ensure_ready(&mut *guard, backend, self.output_size) {
                // Retried every tick; the passthrough output draws until it succeeds.
                log::warn!("output filter `{}` failed to initialize: {e:#}", guard.label());
            }
        }

        self.resolver.mark_dirty();
        self.clock.reset();
        self.fps.reset();
        Ok(())
    }

    /// Releases every GPU object and the context. Idempotent.
    pub(crate) fn teardown(&mut self) {
        let backend = self.context.backend_mut();
        for binding in &mut self.bindings {
            binding.release(backend);
        }
        self.framebuffers.release_all(backend);
        self.default_output.release(backend);
        if let Some(filter) = &self.output_filter {
            filter.lock().release(backend);
        }
        self.context.teardown();
        self.resolver.mark_dirty();
    }

    // ── tick ──────────────────────────────────────────────────────────────

    /// One ingest, layout, offscreen, output, present cycle.
    ///
    /// Only a lost surface is returned as an error; every other failure is
    /// logged and the tick carries on or is skipped.
    pub(crate) fn tick(&mut self) -> Result<TickReport, ContextError> {
        let time = self.clock.tick();
        self.counters.ticks += 1;
        self.last_tick_start = Some(time.now);

        let backend = self.context.backend_mut();
        for binding in &mut self.bindings {
            binding.ingest(backend)?;
        }

        let sources: Vec<Size> = self.bindings.iter().map(InputBinding::native_size).collect();
        self.resolver.resolve(&self.layout, &sources, self.output_size);

        for (slot, size) in sources.iter().enumerate() {
            match self.framebuffers.prepare(backend, slot, *size) {
                Ok(_) => {}
                Err(e @ FramebufferError::Incomplete { .. }) => {
                    log::warn!("{e}");
                    self.counters.framebuffer_failures += 1;
                }
                Err(FramebufferError::Context { source, .. }) => return Err(source),
            }
        }

        let ready: Vec<usize> = self
            .bindings
            .iter()
            .enumerate()
            .filter(|(slot, binding)| {
                !binding.native_size().is_empty()
                    && binding.texture().is_some()
                    && self.framebuffers.is_prepared(*slot)
            })
            .map(|(slot, _)| slot)
            .collect();

        let outcome = if ready.is_empty() || self.output_size.is_empty() {
            TickOutcome::Idle
        } else {
            self.compose(&ready, &time)?
        };

        for error in self.context.backend_mut().take_errors() {
            log::warn!("driver error: {error}");
            self.counters.driver_errors += 1;
        }

        Ok(TickReport { time, outcome })
    }

    fn compose(&mut self, ready: &[usize], time: &FrameTime) -> Result<TickOutcome, ContextError> {
        let backend = self.context.backend_mut();
        match backend.begin_frame() {
            Ok(()) => {}
            Err(SurfaceErrorAction::Fatal) => return Err(ContextError::SurfaceLost),
            Err(action) => {
                log::debug!("frame skipped: {action:?}");
                self.counters.skipped += 1;
                return Ok(TickOutcome::Skipped);
            }
        }

        let mut slots = Vec::with_capacity(ready.len());
        for &slot in ready {
            let binding = &mut self.bindings[slot];
            let (Some(fb), Some(texture)) = (self.framebuffers.get(slot).copied(), binding.texture()) else {
                continue;
            };

            let target = RenderTarget::Offscreen(fb.framebuffer);
            backend.clear(target, TRANSPARENT);
            let call = DrawCall {
                target,
                viewport: fb.size,
                texture,
                quad: Quad::full_frame(),
                transform: binding.transform(),
            };
            if let Err(e) = binding.passthrough_mut().draw(backend, &call) {
                log::warn!("slot {slot}: offscreen pass failed: {e:#}");
            }

            slots.push(ComposedSlot {
                slot,
                framebuffer: fb.framebuffer,
                texture: fb.color,
                size: fb.size,
            });
        }

        let frame = ComposedFrame {
            output_size: self.output_size,
            frame_index: time.frame_index,
            tick_start: time.now,
            slots,
        };

        if let Some(hook) = self.hook.as_mut() {
            hook.after_offscreen(backend, &frame);
        }

        backend.clear(RenderTarget::Presentation, self.clear_color);
        {
            let mut guard = self.output_filter.as_ref().map(|f| f.lock());
            let installed_ready = match guard.as_mut() {
                Some(g) => match ensure_ready(&mut **g, backend, self.output_size) {
                    Ok(()) => {
                        self.output_fallback = false;
                        true
                    }
                    Err(e) => {
                        if !self.output_fallback {
                            log::warn!("output filter `{}` not ready, drawing passthrough: {e:#}", g.label());
                            self.output_fallback = true;
                        }
                        false
                    }
                },
                None => false,
            };
            let filter: &mut dyn FilterUnit<B> = match guard.as_mut() {
                Some(g) if installed_ready => &mut **g,
                _ => self.default_output.as_mut(),
            };

            match ensure_ready(filter, backend, self.output_size) {
                Ok(()) => {
                    for composed in &frame.slots {
                        let quad = self
                            .resolver
                            .quad(composed.slot)
                            .copied()
                            .unwrap_or_else(Quad::full_frame);
                        let call = DrawCall {
                            target: RenderTarget::Presentation,
                            viewport: self.output_size,
                            texture: composed.texture,
                            quad,
                            transform: Mat4::IDENTITY,
                        };
                        if let Err(e) = filter.draw(backend, &call) {
                            log::warn!("slot {}: output pass failed: {e:#}", composed.slot);
                        }
                    }
                }
                Err(e) => log::warn!("output filter `{}` not ready: {e:#}", filter.label()),
            }
        }

        if let Some(hook) = self.hook.as_mut() {
            hook.after_output(backend, &frame);
        }

        self.context.present();
        self.counters.presented += 1;
        if let Some(rate) = self.fps.frame(Instant::now()) {
            log::debug!("{rate:.1} fps");
        }

        Ok(TickOutcome::Presented)
    }

    /// Copies the render-thread counters into `stats`.
    pub(crate) fn publish(&self, stats: &mut LoopStats) {
        stats.ticks = self.counters.ticks;
        stats.frames_presented = self.counters.presented;
        stats.skipped_frames = self.counters.skipped;
        stats.framebuffer_failures = self.counters.framebuffer_failures;
        stats.driver_errors = self.counters.driver_errors;
        stats.fps = self.fps.fps();
        stats.last_tick_start = self.last_tick_start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{HeadlessBackend, HeadlessProbe, HeadlessSurface};
    use crate::input::{ProducerSurface, VideoFrame};

    struct Rig {
        pipeline: Pipeline<HeadlessBackend>,
        probe: HeadlessProbe,
        slots: Vec<Arc<SlotShared>>,
    }

    fn rig(slot_count: usize, output: Size) -> Rig {
        let backend = HeadlessBackend::new();
        let probe = backend.probe();
        let slots: Vec<_> = (0..slot_count).map(|i| Arc::new(SlotShared::new(i))).collect();
        let config = CompositorConfig {
            slots: slot_count,
            initial_output_size: output,
            ..CompositorConfig::default()
        };
        let pipeline = Pipeline::new(backend, HeadlessSurface::new(1), &slots, &config);
        Rig { pipeline, probe, slots }
    }

    fn feed(rig: &Rig, slot: usize, size: Size) {
        ProducerSurface::new(&rig.slots[slot])
            .submit(VideoFrame::solid(size, [255, 0, 0, 255]).unwrap())
            .unwrap();
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn teardown_releases_everything() {
        let mut r = rig(2, Size::new(64, 64));
        r.pipeline.start_run().unwrap();
        for slot in 0..2 {
            r.pipeline.set_input_size(slot, Size::new(16, 16));
            feed(&r, slot, Size::new(16, 16));
        }
        r.pipeline.tick().unwrap();
        r.pipeline.teardown();
        r.pipeline.teardown();

        let s = r.probe.stats();
        assert_eq!(s.live_contexts, 0);
        assert_eq!(s.leaked_at_teardown, 0);
        assert_eq!(s.textures_created, s.textures_released);
        assert_eq!(s.filter_initializations, s.filter_releases);
    }

    #[test]
    fn tick_without_inputs_is_idle() {
        let mut r = rig(1, Size::new(64, 64));
        r.pipeline.start_run().unwrap();
        let report = r.pipeline.tick().unwrap();
        assert_eq!(report.outcome, TickOutcome::Idle);
        assert_eq!(r.probe.stats().frames_begun, 0);
    }

    // ── composition ───────────────────────────────────────────────────────

    #[test]
    fn each_ready_slot_gets_one_offscreen_and_one_output_draw() {
        let mut r = rig(2, Size::new(100, 100));
        r.pipeline.start_run().unwrap();
        r.pipeline.set_input_size(0, Size::new(40, 20));
        r.pipeline.set_input_size(1, Size::new(40, 20));
        feed(&r, 0, Size::new(40, 20));

        let report = r.pipeline.tick().unwrap();
        assert_eq!(report.outcome, TickOutcome::Presented);

        let s = r.probe.stats();
        let offscreen: Vec<_> = s
            .draws
            .iter()
            .filter(|d| matches!(d.target, RenderTarget::Offscreen(_)))
            .collect();
        assert_eq!(offscreen.len(), 1);
        assert_eq!(offscreen[0].viewport, Size::new(40, 20));
        assert_eq!(s.presentation_draws().count(), 1);
        assert_eq!(s.presents, 1);
    }

    #[test]
    fn recoverable_frame_error_skips_the_tick() {
        let mut r = rig(1, Size::new(32, 32));
        r.pipeline.start_run().unwrap();
        r.pipeline.set_input_size(0, Size::new(8, 8));
        feed(&r, 0, Size::new(8, 8));
        r.probe.push_frame_error(SurfaceErrorAction::SkipFrame);

        assert_eq!(r.pipeline.tick().unwrap().outcome, TickOutcome::Skipped);
        assert_eq!(r.pipeline.tick().unwrap().outcome, TickOutcome::Presented);

        let mut stats = LoopStats::default();
        r.pipeline.publish(&mut stats);
        assert_eq!(stats.skipped_frames, 1);
        assert_eq!(stats.frames_presented, 1);
    }

    #[test]
    fn fatal_frame_error_is_surface_lost() {
        let mut r = rig(1, Size::new(32, 32));
        r.pipeline.start_run().unwrap();
        r.pipeline.set_input_size(0, Size::new(8, 8));
        feed(&r, 0, Size::new(8, 8));
        r.probe.push_frame_error(SurfaceErrorAction::Fatal);

        assert_eq!(r.pipeline.tick().unwrap_err(), ContextError::SurfaceLost);
    }

    #[test]
    fn driver_errors_are_counted_not_fatal() {
        let mut r = rig(1, Size::new(32, 32));
        r.pipeline.start_run().unwrap();
        r.probe.push_driver_error("validation: something odd");
        r.pipeline.tick().unwrap();

        let mut stats = LoopStats::default();
        r.pipeline.publish(&mut stats);
        assert_eq!(stats.driver_errors, 1);
    }

    // ── overlay ───────────────────────────────────────────────────────────

    #[test]
    fn overlay_follows_output_size() {
        let mut r = rig(2, Size::new(320, 240));
        r.pipeline.start_run().unwrap();
        r.pipeline.attach_overlay(1);
        assert_eq!(r.pipeline.input_size(1), Some(Size::new(320, 240)));
        assert_eq!(r.pipeline.layout().slots[1].region, SlotRegion::FullFrame);

        r.pipeline.set_output_size(Size::new(640, 480));
        assert_eq!(r.pipeline.input_size(1), Some(Size::new(640, 480)));
        assert_eq!(r.slots[1].buffer_size(), Size::new(640, 480));
        assert_eq!(r.pipeline.input_size(0), Some(Size::ZERO));
    }

    #[test]
    fn set_layout_keeps_overlay_full_frame_and_slot_count() {
        let mut r = rig(2, Size::new(100, 100));
        r.pipeline.attach_overlay(1);
        r.pipeline.set_layout(LayoutConfig::new(5));
        assert_eq!(r.pipeline.layout().slots.len(), 2);
        assert_eq!(r.pipeline.layout().slots[1].region, SlotRegion::FullFrame);
    }
}
