/// A single acquired presentation frame.
///
/// Short-lived: holding the surface texture blocks acquisition of the next one,
/// so the backend presents or drops it before the tick ends.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}
