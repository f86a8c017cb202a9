use std::time::{Duration, Instant};

/// Frames-per-second accumulator reporting once per second.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window_start: Option<Instant>,
    frames: u32,
    last_fps: f32,
}

impl FpsCounter {
    const WINDOW: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        Self {
            window_start: None,
            frames: 0,
            last_fps: 0.0,
        }
    }

    /// Counts one presented frame at `now`.
    ///
    /// Returns the new rate when a one-second window closes.
    pub fn frame(&mut self, now: Instant) -> Option<f32> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;

        let elapsed = now.saturating_duration_since(start);
        if elapsed < Self::WINDOW {
            return None;
        }

        self.last_fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = Some(now);
        Some(self.last_fps)
    }

    pub fn fps(&self) -> f32 {
        self.last_fps
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_after_one_second() {
        let mut fps = FpsCounter::new();
        let t0 = Instant::now();
        for i in 0..30 {
            assert_eq!(fps.frame(t0 + Duration::from_millis(i * 33)), None);
        }
        let rate = fps.frame(t0 + Duration::from_millis(1000)).unwrap();
        assert!((rate - 31.0).abs() < 0.01);
        assert_eq!(fps.fps(), rate);
    }
}
