use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::device::{Backend, ContextError};
use crate::geometry::Size;
use crate::input::SlotShared;

use super::pipeline::Pipeline;
use super::tasks::TaskQueue;
use super::{CompositorConfig, LoopState, LoopStats};

/// Lifecycle state guarded by `Shared::control`.
pub(crate) struct Control<B: Backend> {
    pub(crate) state: LoopState,
    /// Bumped by every `start` that spawns a render thread.
    pub(crate) attempt: u64,
    /// Start failure, tagged with the attempt it belongs to.
    pub(crate) failure: Option<(u64, ContextError)>,
    /// Error that ended the most recent run, if any.
    pub(crate) last_error: Option<ContextError>,
    pub(crate) stop_requested: bool,
    pub(crate) reinit: bool,
    pub(crate) pending_surface: Option<B::Surface>,
    /// The pipeline while no render thread owns it.
    pub(crate) parked: Option<Pipeline<B>>,
    pub(crate) render_thread: Option<ThreadId>,
}

pub(crate) struct Shared<B: Backend> {
    pub(crate) control: Mutex<Control<B>>,
    pub(crate) changed: Condvar,
    /// Cleared (under `control`) to end the current run.
    pub(crate) running: AtomicBool,
    pub(crate) pace: Mutex<()>,
    pub(crate) wake: Condvar,
    pub(crate) before_draw: TaskQueue<B>,
    pub(crate) after_draw: TaskQueue<B>,
    pub(crate) slots: Vec<Arc<SlotShared>>,
    pub(crate) output_size: Mutex<Size>,
    pub(crate) stats: Mutex<LoopStats>,
    pub(crate) config: CompositorConfig,
}

impl<B: Backend> Shared<B> {
    pub(crate) fn new(pipeline: Pipeline<B>, slots: Vec<Arc<SlotShared>>, config: CompositorConfig) -> Self {
        Self {
            control: Mutex::new(Control {
                state: LoopState::Stopped,
                attempt: 0,
                failure: None,
                last_error: None,
                stop_requested: false,
                reinit: false,
                pending_surface: None,
                parked: Some(pipeline),
                render_thread: None,
            }),
            changed: Condvar::new(),
            running: AtomicBool::new(false),
            pace: Mutex::new(()),
            wake: Condvar::new(),
            before_draw: TaskQueue::new(),
            after_draw: TaskQueue::new(),
            output_size: Mutex::new(config.initial_output_size),
            slots,
            stats: Mutex::new(LoopStats::default()),
            config,
        }
    }

    /// Interrupts a pacing wait. Takes the pace lock so a waiter that has
    /// checked `running` but not yet parked cannot miss the notification.
    pub(crate) fn interrupt_pacing(&self) {
        let _guard = self.pace.lock();
        self.wake.notify_all();
    }
}

/// Marks the loop stopped if the render thread unwinds.
struct PanicGuard<'a, B: Backend> {
    shared: &'a Shared<B>,
}

impl<B: Backend> Drop for PanicGuard<'_, B> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        let mut ctl = self.shared.control.lock();
        ctl.state = LoopState::Stopped;
        ctl.reinit = false;
        ctl.render_thread = None;
        self.shared.running.store(false, Ordering::Release);
        self.shared.changed.notify_all();
        log::error!("render thread panicked; the pipeline is lost");
    }
}

/// Render thread entry point.
pub(crate) fn run<B: Backend>(shared: Arc<Shared<B>>) {
    let _guard = PanicGuard { shared: &shared };

    let (mut pipeline, attempt) = {
        let mut ctl = shared.control.lock();
        let Some(pipeline) = ctl.parked.take() else {
            ctl.state = LoopState::Stopped;
            shared.running.store(false, Ordering::Release);
            shared.changed.notify_all();
            return;
        };
        ctl.render_thread = Some(std::thread::current().id());
        (pipeline, ctl.attempt)
    };

    loop {
        // ── starting ──
        let surface = shared.control.lock().pending_surface.take();
        if let Some(surface) = surface {
            pipeline.rebind(surface);
        }

        if let Err(err) = pipeline.start_run() {
            log::error!("render loop failed to start: {err}");
            pipeline.teardown();
            let mut ctl = shared.control.lock();
            ctl.state = LoopState::Stopped;
            ctl.failure = Some((attempt, err.clone()));
            ctl.last_error = Some(err);
            ctl.reinit = false;
            ctl.parked = Some(pipeline);
            ctl.render_thread = None;
            shared.running.store(false, Ordering::Release);
            shared.changed.notify_all();
            return;
        }

        {
            let mut ctl = shared.control.lock();
            ctl.state = LoopState::Running;
            shared.changed.notify_all();
        }
        log::info!("render loop running");

        // ── running ──
        let mut fatal = None;
        while shared.running.load(Ordering::Acquire) {
            if let Err(err) = tick(&shared, &mut pipeline) {
                log::error!("render loop stopped: {err}");
                fatal = Some(err);
                break;
            }
        }

        // ── stopping ──
        {
            let mut ctl = shared.control.lock();
            ctl.state = LoopState::Stopping;
            shared.changed.notify_all();
        }
        pipeline.teardown();
        pipeline.publish(&mut shared.stats.lock());

        let mut ctl = shared.control.lock();
        if fatal.is_none() && ctl.reinit && !ctl.stop_requested {
            ctl.reinit = false;
            ctl.state = LoopState::Starting;
            shared.running.store(true, Ordering::Release);
            shared.stats.lock().restarts += 1;
            shared.changed.notify_all();
            log::info!("reinitializing render loop");
            continue;
        }

        ctl.reinit = false;
        ctl.state = LoopState::Stopped;
        ctl.last_error = fatal;
        ctl.parked = Some(pipeline);
        ctl.render_thread = None;
        shared.running.store(false, Ordering::Release);
        shared.changed.notify_all();
        log::info!("render loop stopped");
        return;
    }
}

fn tick<B: Backend>(shared: &Shared<B>, pipeline: &mut Pipeline<B>) -> Result<(), ContextError> {
    shared.before_draw.drain(pipeline);
    let report = pipeline.tick()?;
    shared.after_draw.drain(pipeline);

    pipeline.publish(&mut shared.stats.lock());
    log::trace!("tick {} -> {:?}", report.time.frame_index, report.outcome);

    pace(shared, report.time.deadline);
    Ok(())
}

/// Sleeps until `deadline`, returning early once the run is ending.
fn pace<B: Backend>(shared: &Shared<B>, deadline: Instant) {
    let mut guard = shared.pace.lock();
    while shared.running.load(Ordering::Acquire) {
        if shared.wake.wait_until(&mut guard, deadline).timed_out() {
            break;
        }
    }
}
