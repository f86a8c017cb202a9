//! The compositor: host API, render thread and per-tick pipeline.
//!
//! The host owns a `Compositor`. Producers get `ProducerSurface`s from it and
//! write frames from their own threads; everything touching the GPU happens
//! on one dedicated render thread. Configuration calls never block on
//! rendering: they enqueue a task that the render thread applies before its
//! next tick.

mod config;
mod error;
mod hook;
mod pipeline;
mod state;
mod tasks;
mod thread;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::device::{Backend, ContextError};
use crate::filter::SharedFilter;
use crate::geometry::{Rotation, Size};
use crate::input::{ProducerSurface, SlotShared};
use crate::layout::{LayoutConfig, ScaleMode, SlotLayout, SlotRegion, SplitDirection};
use crate::overlay::OverlaySurface;

pub use config::CompositorConfig;
pub use error::CompositorError;
pub use hook::{ComposedFrame, ComposedSlot, FrameHook};
pub use pipeline::Pipeline;
pub use state::{LoopState, LoopStats};
pub use tasks::Task;

use thread::Shared;

pub struct Compositor<B: Backend> {
    shared: Arc<Shared<B>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<B: Backend> Compositor<B> {
    /// Creates a stopped compositor bound to `surface`.
    pub fn new(backend: B, surface: B::Surface, config: CompositorConfig) -> Self {
        let slots: Vec<Arc<SlotShared>> = (0..config.slots).map(|i| Arc::new(SlotShared::new(i))).collect();
        let pipeline = Pipeline::new(backend, surface, &slots, &config);

        log::debug!(
            "compositor created: {} slots, {:?} frame interval",
            config.slots,
            config.target_frame_interval
        );

        Self {
            shared: Arc::new(Shared::new(pipeline, slots, config)),
            thread: Mutex::new(None),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.shared.slots.len()
    }

    fn check_slot(&self, slot: usize) -> Result<&Arc<SlotShared>, CompositorError> {
        self.shared.slots.get(slot).ok_or(CompositorError::SlotOutOfRange {
            slot,
            count: self.shared.slots.len(),
        })
    }

    // ── producers ─────────────────────────────────────────────────────────

    /// Producer handle for `slot`. Any number may exist per slot.
    pub fn producer(&self, slot: usize) -> Result<ProducerSurface, CompositorError> {
        Ok(ProducerSurface::new(self.check_slot(slot)?))
    }

    /// Turns `slot` into a full-frame overlay sized to the output and returns
    /// its canvas handle.
    pub fn attach_overlay(&self, slot: usize) -> Result<OverlaySurface, CompositorError> {
        let shared = self.check_slot(slot)?;
        shared.set_follows_output(true);
        shared.set_buffer_size(self.output_size());
        let overlay = OverlaySurface::new(ProducerSurface::new(shared));
        self.run_before_draw(move |p| p.attach_overlay(slot));
        Ok(overlay)
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Starts the render loop and blocks until it is running or has failed.
    ///
    /// Concurrent callers share one start: the loop is spawned once and
    /// every caller returns that attempt's outcome. Returns immediately when
    /// already running.
    pub fn start(&self) -> Result<(), CompositorError> {
        let attempt = {
            let mut ctl = self.shared.control.lock();
            loop {
                match ctl.state {
                    LoopState::Running => return Ok(()),
                    LoopState::Starting => {
                        let attempt = ctl.attempt;
                        self.shared
                            .changed
                            .wait_while(&mut ctl, |c| c.state == LoopState::Starting && c.attempt == attempt);
                        return match &ctl.failure {
                            Some((failed, err)) if *failed == attempt => Err(err.clone().into()),
                            _ => Ok(()),
                        };
                    }
                    LoopState::Stopping => {
                        self.shared
                            .changed
                            .wait_while(&mut ctl, |c| c.state == LoopState::Stopping);
                    }
                    LoopState::Stopped => break,
                }
            }

            if ctl.parked.is_none() {
                return Err(CompositorError::RenderThreadPanicked);
            }
            ctl.state = LoopState::Starting;
            ctl.attempt += 1;
            ctl.failure = None;
            ctl.stop_requested = false;
            ctl.reinit = false;
            self.shared.running.store(true, Ordering::Release);
            ctl.attempt
        };

        {
            let mut join_handle = self.thread.lock();
            if let Some(previous) = join_handle.take() {
                // The previous run already parked its pipeline; this only reaps it.
                let _ = previous.join();
            }

            let shared = self.shared.clone();
            let spawned = std::thread::Builder::new()
                .name(self.shared.config.thread_name.clone())
                .spawn(move || thread::run(shared));

            match spawned {
                Ok(handle) => *join_handle = Some(handle),
                Err(e) => {
                    let mut ctl = self.shared.control.lock();
                    ctl.state = LoopState::Stopped;
                    self.shared.running.store(false, Ordering::Release);
                    self.shared.changed.notify_all();
                    return Err(CompositorError::ThreadSpawn(e.to_string()));
                }
            }
        }

        let mut ctl = self.shared.control.lock();
        self.shared
            .changed
            .wait_while(&mut ctl, |c| c.state == LoopState::Starting && c.attempt == attempt);
        match &ctl.failure {
            Some((failed, err)) if *failed == attempt => Err(err.clone().into()),
            _ => Ok(()),
        }
    }

    /// Asks the render loop to stop after the current tick. Never blocks on it.
    pub fn request_stop(&self) {
        {
            let mut ctl = self.shared.control.lock();
            ctl.stop_requested = true;
            self.shared.running.store(false, Ordering::Release);
        }
        self.shared.interrupt_pacing();
    }

    /// Stops the render loop and waits for its thread to exit.
    ///
    /// Fails with `OnRenderThread` when called from a render-thread task,
    /// which would otherwise join itself.
    pub fn stop(&self) -> Result<(), CompositorError> {
        if self.on_render_thread() {
            return Err(CompositorError::OnRenderThread);
        }

        self.request_stop();
        {
            // A concurrent `start` may not have stored its handle yet.
            let mut ctl = self.shared.control.lock();
            self.shared
                .changed
                .wait_while(&mut ctl, |c| c.state != LoopState::Stopped);
        }
        if let Some(handle) = self.thread.lock().take() {
            handle.join().map_err(|_| CompositorError::RenderThreadPanicked)?;
        }
        Ok(())
    }

    fn on_render_thread(&self) -> bool {
        self.shared.control.lock().render_thread == Some(std::thread::current().id())
    }

    /// Tears the context down and builds a new one, optionally on a new surface.
    ///
    /// Filters and slots survive; their GPU state is recreated. When the loop
    /// is stopped the surface is kept for the next `start`.
    pub fn request_reinitialize(&self, surface: Option<B::Surface>) {
        let interrupt = {
            let mut ctl = self.shared.control.lock();
            if let Some(surface) = surface {
                ctl.pending_surface = Some(surface);
            }
            match ctl.state {
                LoopState::Starting | LoopState::Running | LoopState::Stopping => {
                    ctl.reinit = true;
                    self.shared.running.store(false, Ordering::Release);
                    true
                }
                LoopState::Stopped => false,
            }
        };
        if interrupt {
            self.shared.interrupt_pacing();
        }
    }

    pub fn state(&self) -> LoopState {
        self.shared.control.lock().state
    }

    /// The error that ended the most recent run, if it ended on one.
    pub fn last_error(&self) -> Option<ContextError> {
        self.shared.control.lock().last_error.clone()
    }

    pub fn stats(&self) -> LoopStats {
        let mut stats = self.shared.stats.lock().clone();
        stats.signals = self.shared.slots.iter().map(|s| s.signals()).collect();
        stats.ingested = self.shared.slots.iter().map(|s| s.ingests()).collect();
        stats
    }

    // ── configuration ─────────────────────────────────────────────────────

    pub fn output_size(&self) -> Size {
        *self.shared.output_size.lock()
    }

    /// Records the presentation surface size.
    ///
    /// Overlay canvases report the new size immediately; the render thread
    /// resizes the surface, filters and overlay framebuffers before its next tick.
    pub fn set_output_size(&self, size: Size) {
        *self.shared.output_size.lock() = size;
        for slot in self.shared.slots.iter().filter(|s| s.follows_output()) {
            slot.set_buffer_size(size);
        }
        self.run_before_draw(move |p| p.set_output_size(size));
    }

    /// Records the native size of `slot`'s producer.
    pub fn set_input_size(&self, slot: usize, size: Size) -> Result<(), CompositorError> {
        self.check_slot(slot)?;
        self.run_before_draw(move |p| p.set_input_size(slot, size));
        Ok(())
    }

    pub fn set_layout(&self, layout: LayoutConfig) {
        self.run_before_draw(move |p| p.set_layout(layout));
    }

    pub fn set_split(&self, split: SplitDirection) {
        self.run_before_draw(move |p| p.update_layout(|l| l.split = split));
    }

    pub fn set_scale_mode(&self, slot: usize, scale: ScaleMode) -> Result<(), CompositorError> {
        self.update_slot(slot, move |s| s.scale = scale)
    }

    pub fn set_rotation(&self, slot: usize, rotation: Rotation) -> Result<(), CompositorError> {
        self.update_slot(slot, move |s| s.rotation = rotation)
    }

    pub fn set_flip(&self, slot: usize, horizontal: bool, vertical: bool) -> Result<(), CompositorError> {
        self.update_slot(slot, move |s| {
            s.flip_horizontal = horizontal;
            s.flip_vertical = vertical;
        })
    }

    pub fn set_region(&self, slot: usize, region: SlotRegion) -> Result<(), CompositorError> {
        self.update_slot(slot, move |s| s.region = region)
    }

    fn update_slot(
        &self,
        slot: usize,
        update: impl FnOnce(&mut SlotLayout) + Send + 'static,
    ) -> Result<(), CompositorError> {
        self.check_slot(slot)?;
        self.run_before_draw(move |p| {
            p.update_layout(|l| {
                if let Some(s) = l.slots.get_mut(slot) {
                    update(s);
                }
            })
        });
        Ok(())
    }

    pub fn set_clear_color(&self, color: [f32; 4]) {
        self.run_before_draw(move |p| p.set_clear_color(color));
    }

    /// Installs the output filter. The previous one is released on the
    /// render thread; the caller keeps its own handle to `filter`.
    pub fn set_output_filter(&self, filter: SharedFilter<B>) {
        self.run_before_draw(move |p| p.set_output_filter(Some(filter)));
    }

    /// Goes back to the built-in passthrough output filter.
    pub fn clear_output_filter(&self) {
        self.run_before_draw(|p| p.set_output_filter(None));
    }

    pub fn set_frame_hook(&self, hook: impl FrameHook<B> + 'static) {
        let hook: Box<dyn FrameHook<B>> = Box::new(hook);
        self.run_before_draw(move |p| p.set_hook(Some(hook)));
    }

    pub fn clear_frame_hook(&self) {
        self.run_before_draw(|p| p.set_hook(None));
    }

    // ── tasks ─────────────────────────────────────────────────────────────

    /// Runs `task` on the render thread before the next tick draws.
    ///
    /// Tasks run in submission order. Queued tasks survive a stop and run on
    /// the next start.
    pub fn run_before_draw(&self, task: impl FnOnce(&mut Pipeline<B>) + Send + 'static) {
        self.shared.before_draw.push(Box::new(task));
    }

    /// Runs `task` on the render thread after the next tick presents.
    pub fn run_after_draw(&self, task: impl FnOnce(&mut Pipeline<B>) + Send + 'static) {
        self.shared.after_draw.push(Box::new(task));
    }

    /// Tasks waiting for the render thread.
    pub fn pending_tasks(&self) -> usize {
        self.shared.before_draw.len() + self.shared.after_draw.len()
    }
}

impl<B: Backend> Drop for Compositor<B> {
    fn drop(&mut self) {
        self.request_stop();
        if self.on_render_thread() {
            return;
        }
        let Some(handle) = self.thread.get_mut().take() else {
            return;
        };
        if handle.join().is_err() {
            log::error!("render thread panicked during shutdown");
        }
    }
}
