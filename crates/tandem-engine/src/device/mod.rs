//! Graphics device layer.
//!
//! All GPU work goes through the `Backend` trait so the compositor loop is the
//! same on real hardware (`WgpuBackend`) and in tests (`HeadlessBackend`).
//! `GraphicsContext` wraps a backend with the create/make-current/present/teardown
//! lifecycle the render thread drives.

mod backend;
mod context;
mod error;
mod frame;
mod gpu;
mod headless;
mod init;
mod surface;

pub use backend::{
    Backend, DepthBufferId, FramebufferId, FramebufferStatus, RenderTarget, TextureId, TextureUsage,
};
pub use context::GraphicsContext;
pub use error::{ContextError, SurfaceErrorAction};
pub use frame::GpuFrame;
pub use gpu::{GpuTexture, PassResources, WgpuBackend};
pub use headless::{DrawRecord, HeadlessBackend, HeadlessFilter, HeadlessProbe, HeadlessStats, HeadlessSurface};
pub use init::GpuInit;
