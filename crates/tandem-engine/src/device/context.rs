use crate::geometry::Size;

use super::{Backend, ContextError};

/// Context lifecycle around a backend.
///
/// Holds the presentation surface to bind to, so a reinitialization can swap
/// it without touching anything else the render thread owns.
pub struct GraphicsContext<B: Backend> {
    backend: B,
    surface: B::Surface,
    live: bool,
}

impl<B: Backend> GraphicsContext<B> {
    pub fn new(backend: B, surface: B::Surface) -> Self {
        Self {
            backend,
            surface,
            live: false,
        }
    }

    /// Replaces the surface used by the next `initialize`.
    pub fn rebind(&mut self, surface: B::Surface) {
        self.surface = surface;
    }

    pub fn surface(&self) -> &B::Surface {
        &self.surface
    }

    /// Creates a context on the bound surface and makes it current.
    ///
    /// Any previous context is torn down first, so at most one is ever live.
    pub fn initialize(&mut self, size: Size) -> Result<(), ContextError> {
        self.teardown();

        self.backend.create_context(self.surface.clone(), size)?;
        self.live = true;

        if let Err(e) = self.backend.make_current() {
            self.teardown();
            return Err(e);
        }

        log::info!("graphics context created ({}x{})", size.width, size.height);
        Ok(())
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn resize(&mut self, size: Size) {
        if self.live {
            self.backend.resize_surface(size);
        }
    }

    pub fn present(&mut self) {
        if self.live {
            self.backend.present();
        }
    }

    /// Releases the context. Safe to call any number of times.
    pub fn teardown(&mut self) {
        if !self.live {
            return;
        }
        self.backend.destroy_context();
        self.live = false;
        log::info!("graphics context destroyed");
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
