//! Tandem engine crate.
//!
//! A real-time compositor: independent producers feed input slots, a dedicated
//! render thread moves each slot into its own offscreen framebuffer and then
//! composes every framebuffer into one presentation surface per tick.

pub mod compositor;
pub mod device;
pub mod filter;
pub mod geometry;
pub mod input;
pub mod layout;
pub mod logging;
pub mod offscreen;
pub mod overlay;
pub mod time;

pub use compositor::{Compositor, CompositorConfig, CompositorError, LoopState, LoopStats};
pub use device::{Backend, ContextError, HeadlessBackend, WgpuBackend};
pub use geometry::{Quad, Rotation, Size};
pub use input::{ProducerError, ProducerSurface, VideoFrame};
pub use layout::{LayoutConfig, ScaleMode, SlotLayout, SlotRegion, SplitDirection};
pub use overlay::OverlaySurface;
