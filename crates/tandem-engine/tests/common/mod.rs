#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tandem_engine::compositor::{ComposedFrame, FrameHook};
use tandem_engine::device::{HeadlessProbe, HeadlessSurface};
use tandem_engine::{Compositor, CompositorConfig, HeadlessBackend, ProducerSurface, Size, VideoFrame};

pub const WAIT: Duration = Duration::from_secs(5);

/// Polls `cond` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

pub fn config(slots: usize, output: Size) -> CompositorConfig {
    CompositorConfig {
        slots,
        target_frame_interval: Duration::from_millis(2),
        initial_output_size: output,
        thread_name: "tandem-test-render".into(),
        ..CompositorConfig::default()
    }
}

pub fn headless(config: CompositorConfig) -> (Compositor<HeadlessBackend>, HeadlessProbe) {
    let backend = HeadlessBackend::new();
    let probe = backend.probe();
    (Compositor::new(backend, HeadlessSurface::new(1), config), probe)
}

pub fn submit_solid(producer: &ProducerSurface, size: Size) {
    producer
        .submit(VideoFrame::solid(size, [0x20, 0x80, 0xff, 0xff]).unwrap())
        .unwrap();
}

/// Feeds one frame into `slot` after declaring its native size.
pub fn feed(compositor: &Compositor<HeadlessBackend>, slot: usize, size: Size) -> ProducerSurface {
    compositor.set_input_size(slot, size).unwrap();
    let producer = compositor.producer(slot).unwrap();
    submit_solid(&producer, size);
    producer
}

#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    Offscreen(u64),
    Output(u64),
}

/// Frame hook that keeps every frame it sees.
#[derive(Clone, Default)]
pub struct Recorder {
    pub events: Arc<Mutex<Vec<HookEvent>>>,
    pub frames: Arc<Mutex<Vec<ComposedFrame>>>,
}

impl FrameHook<HeadlessBackend> for Recorder {
    fn after_offscreen(&mut self, _backend: &mut HeadlessBackend, frame: &ComposedFrame) {
        self.events.lock().push(HookEvent::Offscreen(frame.frame_index));
    }

    fn after_output(&mut self, _backend: &mut HeadlessBackend, frame: &ComposedFrame) {
        self.events.lock().push(HookEvent::Output(frame.frame_index));
        self.frames.lock().push(frame.clone());
    }
}
