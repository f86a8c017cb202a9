use std::time::{Duration, Instant};

/// Tick timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous tick, in seconds.
    pub dt: f32,

    /// Monotonic timestamp taken at the start of the tick.
    pub now: Instant,

    /// Monotonic tick counter.
    pub frame_index: u64,

    /// When the next tick should start.
    pub deadline: Instant,
}

/// Fixed-interval tick clock.
///
/// Delta time is clamped so a stalled loop (debugger, suspended host) does not
/// report absurd values to hooks.
#[derive(Debug, Clone)]
pub struct FrameClock {
    interval: Duration,
    last: Option<Instant>,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            frame_index: 0,
            dt_min: Duration::from_micros(100),
            dt_max: Duration::from_millis(250),
        }
    }

    /// Forgets the previous tick; the next `dt` is measured as one interval.
    ///
    /// Called when a run restarts so the first tick does not report the downtime.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Records the start of a tick.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let dt = match self.last {
            Some(last) => now.saturating_duration_since(last),
            None => self.interval,
        }
        .clamp(self.dt_min, self.dt_max.max(self.dt_min));

        self.last = Some(now);

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            frame_index: self.frame_index,
            deadline: now + self.interval,
        };

        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }

    /// Time left before `deadline`, zero if already past.
    pub fn remaining(deadline: Instant, now: Instant) -> Duration {
        deadline.saturating_duration_since(now)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_is_one_interval_after_start() {
        let mut clock = FrameClock::new(Duration::from_millis(16));
        let ft = clock.tick();
        assert_eq!(ft.deadline - ft.now, Duration::from_millis(16));
    }

    #[test]
    fn frame_index_increments() {
        let mut clock = FrameClock::default();
        assert_eq!(clock.tick().frame_index, 0);
        assert_eq!(clock.tick().frame_index, 1);
        clock.reset();
        assert_eq!(clock.tick().frame_index, 2);
    }

    #[test]
    fn first_tick_reports_one_interval() {
        let mut clock = FrameClock::new(Duration::from_millis(20));
        let ft = clock.tick();
        assert!((ft.dt - 0.020).abs() < 1e-6);
    }

    #[test]
    fn remaining_saturates() {
        let now = Instant::now();
        assert_eq!(FrameClock::remaining(now, now + Duration::from_millis(5)), Duration::ZERO);
        assert_eq!(
            FrameClock::remaining(now + Duration::from_millis(5), now),
            Duration::from_millis(5)
        );
    }
}
