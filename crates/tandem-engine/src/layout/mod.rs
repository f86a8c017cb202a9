//! Split-screen layout and per-slot scaling.
//!
//! `LayoutConfig` is plain data mutated through compositor setters;
//! `LayoutResolver` turns it into one `Quad` per slot on the render thread.

mod config;
mod scaling;

pub use config::{LayoutConfig, ScaleMode, SlotLayout, SlotRegion, SplitDirection};
pub use scaling::{scale_quad, LayoutResolver};
