use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tandem_engine::device::GpuInit;
use tandem_engine::filter::SharedFilter;
use tandem_engine::{
    Compositor, CompositorConfig, LayoutConfig, Rotation, ScaleMode, Size, SplitDirection,
    WgpuBackend,
};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::filters;
use crate::producers::{OverlayProducer, Pattern, PatternProducer};
use crate::snapshot::{SnapshotHook, SnapshotTrigger};

const CAMERA_SLOTS: [(Size, Pattern); 2] = [
    (Size::new(1280, 720), Pattern::Sweep),
    (Size::new(720, 1280), Pattern::Checker),
];
const OVERLAY_SLOT: usize = 2;
const PRODUCER_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub frame_interval: Duration,
    pub gpu: GpuInit,
    pub snapshot_dir: PathBuf,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            title: "tandem studio".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            frame_interval: Duration::from_millis(16),
            gpu: GpuInit {
                readable_surface: true,
                ..GpuInit::default()
            },
            snapshot_dir: PathBuf::from("."),
        }
    }
}

/// Everything that lives once a window exists.
struct Session {
    // Dropped before the compositor so producer threads exit first.
    _producers: Vec<PatternProducer>,
    _overlay: OverlayProducer,
    compositor: Compositor<WgpuBackend>,
    window: Arc<Window>,
}

/// Layout state driven from the keyboard.
struct Controls {
    split: SplitDirection,
    scale: ScaleMode,
    rotation: Rotation,
    grayscale: Option<SharedFilter<WgpuBackend>>,
    snapshot: SnapshotTrigger,
}

impl Controls {
    fn layout(&self, slots: usize) -> LayoutConfig {
        let mut layout = LayoutConfig::new(slots)
            .with_split(self.split)
            .with_scale(self.scale);
        layout.slots[0].rotation = self.rotation;
        layout
    }
}

pub struct Studio {
    config: StudioConfig,
    session: Option<Session>,
    controls: Controls,
}

impl Studio {
    pub fn new(config: StudioConfig) -> Self {
        Self {
            config,
            session: None,
            controls: Controls {
                split: SplitDirection::Horizontal,
                scale: ScaleMode::Fit,
                rotation: Rotation::Normal,
                grayscale: None,
                snapshot: SnapshotTrigger::default(),
            },
        }
    }

    fn open_session(&mut self, event_loop: &ActiveEventLoop) -> Result<Session> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let slots = CAMERA_SLOTS.len() + 1;
        let compositor = Compositor::new(
            WgpuBackend::new(self.config.gpu.clone()),
            window.clone(),
            CompositorConfig {
                slots,
                target_frame_interval: self.config.frame_interval,
                initial_output_size: Size::from(window.inner_size()),
                ..CompositorConfig::default()
            },
        );
        compositor.set_layout(self.controls.layout(slots));
        compositor.set_frame_hook(SnapshotHook::new(
            self.controls.snapshot.clone(),
            self.config.snapshot_dir.clone(),
        ));

        let mut producers = Vec::with_capacity(CAMERA_SLOTS.len());
        for (slot, (size, pattern)) in CAMERA_SLOTS.iter().enumerate() {
            compositor.set_input_size(slot, *size)?;
            producers.push(
                PatternProducer::spawn(compositor.producer(slot)?, *size, *pattern, PRODUCER_INTERVAL)
                    .context("failed to spawn producer")?,
            );
        }
        let overlay = OverlayProducer::spawn(compositor.attach_overlay(OVERLAY_SLOT)?, PRODUCER_INTERVAL)
            .context("failed to spawn overlay producer")?;

        compositor.start().context("failed to start compositor")?;

        Ok(Session {
            _producers: producers,
            _overlay: overlay,
            compositor,
            window,
        })
    }

    fn on_key(&mut self, code: KeyCode, event_loop: &ActiveEventLoop) {
        let Some(session) = &self.session else {
            return;
        };
        let compositor = &session.compositor;

        match code {
            KeyCode::KeyS => {
                self.controls.split = match self.controls.split {
                    SplitDirection::None => SplitDirection::Horizontal,
                    SplitDirection::Horizontal => SplitDirection::Vertical,
                    SplitDirection::Vertical => SplitDirection::None,
                };
                compositor.set_split(self.controls.split);
                log::info!("split: {:?}", self.controls.split);
            }
            KeyCode::KeyC => {
                self.controls.scale = match self.controls.scale {
                    ScaleMode::Fit => ScaleMode::Crop,
                    ScaleMode::Crop => ScaleMode::Fit,
                };
                compositor.set_layout(self.controls.layout(compositor.slot_count()));
                log::info!("scale: {:?}", self.controls.scale);
            }
            KeyCode::KeyR => {
                self.controls.rotation = self.controls.rotation.clockwise();
                if let Err(e) = compositor.set_rotation(0, self.controls.rotation) {
                    log::warn!("{e}");
                }
                log::info!("slot 0 rotation: {:?}", self.controls.rotation);
            }
            KeyCode::KeyF => match self.controls.grayscale.take() {
                Some(_) => {
                    compositor.clear_output_filter();
                    log::info!("output filter: passthrough");
                }
                None => {
                    let filter = filters::grayscale();
                    compositor.set_output_filter(filter.clone());
                    self.controls.grayscale = Some(filter);
                    log::info!("output filter: grayscale");
                }
            },
            KeyCode::KeyP => {
                self.controls.snapshot.request();
                log::info!("snapshot requested");
            }
            KeyCode::Escape => self.shutdown(event_loop),
            _ => {}
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.compositor.stop() {
                log::error!("compositor stop failed: {e}");
            }
            let stats = session.compositor.stats();
            log::info!(
                "presented {} frames in {} ticks ({} skipped, {} restarts)",
                stats.frames_presented,
                stats.ticks,
                stats.skipped_frames,
                stats.restarts
            );
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for Studio {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        if let Some(session) = &self.session {
            // Returning from suspension: the old surface may be gone.
            session.compositor.request_reinitialize(Some(session.window.clone()));
            if let Err(e) = session.compositor.start() {
                log::error!("failed to restart compositor: {e}");
                self.shutdown(event_loop);
            }
            return;
        }

        match self.open_session(event_loop) {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                log::error!("failed to open studio session: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = &self.session {
            session.compositor.request_stop();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),

            WindowEvent::Resized(new_size) => {
                if let Some(session) = &self.session {
                    session.compositor.set_output_size(Size::from(new_size));
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(session) = &self.session {
                    let size = session.window.inner_size();
                    session.compositor.set_output_size(Size::from(size));
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.on_key(code, event_loop);
                }
            }

            _ => {}
        }
    }
}
