use std::time::Duration;

use crate::geometry::Size;

/// Compositor configuration.
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// Number of input slots, fixed for the compositor's lifetime.
    pub slots: usize,

    /// Target time between tick starts. 16 ms gives roughly 60 Hz.
    pub target_frame_interval: Duration,

    /// Straight RGBA the presentation surface is cleared to each frame.
    pub clear_color: [f32; 4],

    pub thread_name: String,

    /// Output size known before the first `set_output_size`.
    pub initial_output_size: Size,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            slots: 1,
            target_frame_interval: Duration::from_millis(16),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            thread_name: "tandem-render".to_string(),
            initial_output_size: Size::ZERO,
        }
    }
}
