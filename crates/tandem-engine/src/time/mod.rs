//! Time subsystem.
//!
//! Tick pacing for the render loop. One `FrameClock` per compositor; call
//! `tick()` once at the start of every loop iteration.

mod fps;
mod frame_clock;

pub use fps::FpsCounter;
pub use frame_clock::{FrameClock, FrameTime};
