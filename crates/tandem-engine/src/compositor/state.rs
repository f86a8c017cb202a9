use std::time::Instant;

/// Render loop lifecycle.
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`; a reinitialization
/// goes `Stopping -> Starting` without passing through `Stopped`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Counters published by the render thread after every tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopStats {
    pub ticks: u64,
    pub frames_presented: u64,
    /// Ticks whose frame acquisition failed and were skipped.
    pub skipped_frames: u64,
    /// Reinitializations completed (teardown followed by a new context).
    pub restarts: u64,
    pub fps: f32,
    pub framebuffer_failures: u64,
    pub driver_errors: u64,
    pub last_tick_start: Option<Instant>,
    /// Per-slot frame-ready signals from producers.
    pub signals: Vec<u64>,
    /// Per-slot frames moved into GPU textures.
    pub ingested: Vec<u64>,
}
