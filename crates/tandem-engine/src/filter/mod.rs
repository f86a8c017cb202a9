//! Filter units.
//!
//! A filter is an opaque "bind texture, draw quad" capability. The compositor
//! owns one passthrough filter per input slot and holds a shared reference to
//! the single output filter the host installs.

mod common;
mod shader;

use std::sync::Arc;

use glam::Mat4;
use parking_lot::Mutex;

use crate::device::{Backend, RenderTarget, TextureId};
use crate::geometry::{Quad, Size};

pub use common::{FilterVertex, TransformUniform};
pub use shader::ShaderFilter;

/// Everything a filter needs for one draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub target: RenderTarget,
    /// Pixel size of the target; the viewport always covers all of it.
    pub viewport: Size,
    pub texture: TextureId,
    pub quad: Quad,
    /// Applied to texture coordinates before sampling.
    pub transform: Mat4,
}

pub trait FilterUnit<B: Backend>: Send {
    fn label(&self) -> &str;

    /// Creates GPU state. Called on the render thread with a current context.
    fn initialize(&mut self, backend: &mut B) -> anyhow::Result<()>;

    fn is_initialized(&self) -> bool;

    fn set_output_size(&mut self, size: Size);

    fn draw(&mut self, backend: &mut B, call: &DrawCall) -> anyhow::Result<()>;

    /// Drops GPU state. The filter may be initialized again afterwards.
    fn release(&mut self, backend: &mut B);
}

/// Output filter handle. The installer keeps its own clone.
pub type SharedFilter<B> = Arc<Mutex<dyn FilterUnit<B>>>;

pub fn shared<B, F>(filter: F) -> SharedFilter<B>
where
    B: Backend,
    F: FilterUnit<B> + 'static,
{
    Arc::new(Mutex::new(filter))
}

/// Initializes `filter` if needed and sizes it. Errors are returned for logging.
pub(crate) fn ensure_ready<B: Backend>(
    filter: &mut dyn FilterUnit<B>,
    backend: &mut B,
    size: Size,
) -> anyhow::Result<()> {
    if !filter.is_initialized() {
        filter.initialize(backend)?;
        filter.set_output_size(size);
    }
    Ok(())
}
