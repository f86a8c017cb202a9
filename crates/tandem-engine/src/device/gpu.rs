use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::SlotMap;
use winit::window::Window;

use crate::filter::{FilterUnit, ShaderFilter};
use crate::geometry::Size;
use crate::input::VideoFrame;

use super::surface;
use super::{
    Backend, ContextError, DepthBufferId, FramebufferId, FramebufferStatus, GpuFrame, GpuInit,
    RenderTarget, SurfaceErrorAction, TextureId, TextureUsage,
};

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// wgpu core objects for one context run.
///
/// Created on the render thread in `create_context`, dropped in `destroy_context`.
struct GpuState {
    _instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    _adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: Size,
    sampler: wgpu::Sampler,
    window: Arc<Window>,
}

/// A color texture together with its default view.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: Size,
    pub format: wgpu::TextureFormat,
    valid: bool,
}

struct GpuDepthBuffer {
    texture: wgpu::Texture,
    _view: wgpu::TextureView,
    size: Size,
    valid: bool,
}

struct GpuFramebuffer {
    color: TextureId,
    depth: DepthBufferId,
    status: FramebufferStatus,
}

/// Borrowed GPU state for one filter draw.
pub struct PassResources<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub target_view: &'a wgpu::TextureView,
    pub target_format: wgpu::TextureFormat,
    pub source_view: &'a wgpu::TextureView,
    pub sampler: &'a wgpu::Sampler,
}

/// wgpu backend presenting into a winit window.
pub struct WgpuBackend {
    init: GpuInit,
    gpu: Option<GpuState>,
    frame: Option<GpuFrame>,
    textures: SlotMap<TextureId, GpuTexture>,
    depth_buffers: SlotMap<DepthBufferId, GpuDepthBuffer>,
    framebuffers: SlotMap<FramebufferId, GpuFramebuffer>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl WgpuBackend {
    pub fn new(init: GpuInit) -> Self {
        Self {
            init,
            gpu: None,
            frame: None,
            textures: SlotMap::with_key(),
            depth_buffers: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            errors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn device(&self) -> Option<&wgpu::Device> {
        self.gpu.as_ref().map(|g| &g.device)
    }

    pub fn queue(&self) -> Option<&wgpu::Queue> {
        self.gpu.as_ref().map(|g| &g.queue)
    }

    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.gpu.as_ref().map(|g| g.config.format)
    }

    pub fn texture(&self, id: TextureId) -> Option<&GpuTexture> {
        self.textures.get(id)
    }

    /// The frame acquired this tick, for hooks that read back the output.
    pub fn current_frame(&mut self) -> Option<&mut GpuFrame> {
        self.frame.as_mut()
    }

    /// Resources for drawing `source` into `target` during the current frame.
    pub fn pass(&mut self, target: RenderTarget, source: TextureId) -> Option<PassResources<'_>> {
        let gpu = self.gpu.as_ref()?;
        let frame = self.frame.as_mut()?;
        let source = self.textures.get(source).filter(|t| t.valid)?;

        let (target_view, target_format) = match target {
            RenderTarget::Presentation => (&frame.view, gpu.config.format),
            RenderTarget::Offscreen(id) => {
                let fb = self.framebuffers.get(id)?;
                let color = self.textures.get(fb.color)?;
                (&color.view, color.format)
            }
        };

        Some(PassResources {
            device: &gpu.device,
            queue: &gpu.queue,
            encoder: &mut frame.encoder,
            target_view,
            target_format,
            source_view: &source.view,
            sampler: &gpu.sampler,
        })
    }

    fn gpu(&self) -> Result<&GpuState, ContextError> {
        self.gpu.as_ref().ok_or(ContextError::NotCurrent)
    }

    fn push_error(&self, message: String) {
        self.errors.lock().push(message);
    }
}

fn create_gpu_state(
    init: &GpuInit,
    window: Arc<Window>,
    size: Size,
    errors: Arc<Mutex<Vec<String>>>,
) -> Result<GpuState, ContextError> {
    let size = if size.is_empty() {
        Size::from(window.inner_size())
    } else {
        size
    };

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let surface = instance
        .create_surface(window.clone())
        .map_err(|e| ContextError::SurfaceUnusable(e.to_string()))?;

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: init.power_preference,
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
    }))
    .map_err(|e| ContextError::ConfigUnavailable(format!("no suitable adapter: {e}")))?;

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("tandem-engine device"),
        required_features: init.required_features,
        required_limits: init.required_limits.clone(),
        experimental_features: wgpu::ExperimentalFeatures::disabled(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::Off,
    }))
    .map_err(|e| ContextError::ContextRejected(e.to_string()))?;

    device.on_uncaptured_error(Arc::new(move |error| {
        errors.lock().push(error.to_string());
    }));

    let caps = surface.get_capabilities(&adapter);
    let format = surface::choose_surface_format(&caps, init.prefer_srgb)
        .ok_or_else(|| ContextError::ConfigUnavailable("no supported surface formats".into()))?;

    let config = wgpu::SurfaceConfiguration {
        usage: surface::surface_usage(&caps, init.readable_surface),
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: init.present_mode,
        alpha_mode: surface::choose_alpha_mode(&caps, init.alpha_mode),
        view_formats: vec![],
        desired_maximum_frame_latency: init.desired_maximum_frame_latency,
    };

    if !size.is_empty() {
        surface.configure(&device, &config);
    }

    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("tandem filter sampler"),
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        ..Default::default()
    });

    log::info!(
        "wgpu context on {:?} ({:?}), surface {:?}",
        adapter.get_info().name,
        adapter.get_info().backend,
        format
    );

    Ok(GpuState {
        _instance: instance,
        surface,
        _adapter: adapter,
        device,
        queue,
        config,
        size,
        sampler,
        window,
    })
}

/// Creates a 2D texture inside a validation scope. Returns the texture and the
/// validation error, if the driver rejected it.
fn create_checked_texture(
    device: &wgpu::Device,
    label: &str,
    size: Size,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> (wgpu::Texture, Option<wgpu::Error>) {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    let error = pollster::block_on(scope.pop());
    (texture, error)
}

impl Backend for WgpuBackend {
    type Surface = Arc<Window>;

    fn create_context(&mut self, surface: Arc<Window>, size: Size) -> Result<(), ContextError> {
        if self.gpu.is_some() {
            self.destroy_context();
        }
        let state = create_gpu_state(&self.init, surface, size, self.errors.clone())?;
        self.gpu = Some(state);
        Ok(())
    }

    fn make_current(&mut self) -> Result<(), ContextError> {
        // wgpu has no thread-bound current context; a live device is enough.
        self.gpu().map(|_| ())
    }

    fn destroy_context(&mut self) {
        let Some(gpu) = self.gpu.take() else {
            return;
        };

        self.frame = None;
        let leaked = self.textures.len() + self.depth_buffers.len() + self.framebuffers.len();
        if leaked > 0 {
            log::warn!("{leaked} GPU objects still alive at context teardown; dropping them");
        }
        self.framebuffers.clear();
        self.depth_buffers.clear();
        self.textures.clear();

        drop(gpu);
    }

    fn has_context(&self) -> bool {
        self.gpu.is_some()
    }

    fn resize_surface(&mut self, size: Size) {
        if let Some(gpu) = self.gpu.as_mut() {
            // A pending frame belongs to the old configuration.
            self.frame = None;
            surface::apply_resize(&gpu.surface, &gpu.device, &mut gpu.config, &mut gpu.size, size);
        }
    }

    fn begin_frame(&mut self) -> Result<(), SurfaceErrorAction> {
        let Some(gpu) = self.gpu.as_ref() else {
            return Err(SurfaceErrorAction::Fatal);
        };
        if gpu.size.is_empty() {
            return Err(SurfaceErrorAction::SkipFrame);
        }

        self.frame = None;

        let surface_texture = match gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err) => {
                return Err(surface::map_surface_error(
                    &gpu.surface,
                    &gpu.device,
                    &gpu.config,
                    gpu.size,
                    err,
                ));
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tandem frame encoder"),
            });

        self.frame = Some(GpuFrame {
            surface_texture,
            view,
            encoder,
        });
        Ok(())
    }

    fn clear(&mut self, target: RenderTarget, color: [f32; 4]) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };

        let view = match target {
            RenderTarget::Presentation => &frame.view,
            RenderTarget::Offscreen(id) => {
                match self.framebuffers.get(id).and_then(|fb| self.textures.get(fb.color)) {
                    Some(texture) => &texture.view,
                    None => return,
                }
            }
        };

        let [r, g, b, a] = color.map(f64::from);
        let _pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tandem clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    fn present(&mut self) {
        let Some(frame) = self.frame.take() else {
            return;
        };
        let Some(gpu) = self.gpu.as_ref() else {
            return;
        };

        gpu.queue.submit(std::iter::once(frame.encoder.finish()));
        gpu.window.pre_present_notify();
        frame.surface_texture.present();
    }

    fn create_texture(&mut self, size: Size, usage: TextureUsage) -> Result<TextureId, ContextError> {
        let gpu = self.gpu()?;
        let (label, usages) = match usage {
            TextureUsage::Input => (
                "tandem input texture",
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            ),
            TextureUsage::RenderTarget => (
                "tandem offscreen color",
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
            ),
        };

        let (texture, error) = create_checked_texture(&gpu.device, label, size, COLOR_FORMAT, usages);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let valid = error.is_none();
        if let Some(err) = error {
            self.push_error(format!("{label} {}x{}: {err}", size.width, size.height));
        }

        Ok(self.textures.insert(GpuTexture {
            texture,
            view,
            size,
            format: COLOR_FORMAT,
            valid,
        }))
    }

    fn write_texture(&mut self, texture: TextureId, frame: &VideoFrame) {
        let Some(gpu) = self.gpu.as_ref() else {
            return;
        };
        let Some(target) = self.textures.get(texture).filter(|t| t.valid) else {
            return;
        };
        let size = frame.size();
        if target.size != size {
            let msg = format!("upload of {size:?} into texture of {:?}", target.size);
            self.push_error(msg);
            return;
        }

        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            frame.data(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 4),
                rows_per_image: Some(size.height),
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn release_texture(&mut self, texture: TextureId) {
        if let Some(t) = self.textures.remove(texture) {
            t.texture.destroy();
        }
    }

    fn create_depth_buffer(&mut self, size: Size) -> Result<DepthBufferId, ContextError> {
        let gpu = self.gpu()?;
        let (texture, error) = create_checked_texture(
            &gpu.device,
            "tandem offscreen depth",
            size,
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let valid = error.is_none();
        if let Some(err) = error {
            self.push_error(format!("depth buffer {}x{}: {err}", size.width, size.height));
        }

        Ok(self.depth_buffers.insert(GpuDepthBuffer {
            texture,
            _view: view,
            size,
            valid,
        }))
    }

    fn release_depth_buffer(&mut self, depth: DepthBufferId) {
        if let Some(d) = self.depth_buffers.remove(depth) {
            d.texture.destroy();
        }
    }

    fn create_framebuffer(
        &mut self,
        color: TextureId,
        depth: DepthBufferId,
    ) -> Result<FramebufferId, ContextError> {
        let gpu = self.gpu()?;
        let max = gpu.device.limits().max_texture_dimension_2d;

        let status = match (self.textures.get(color), self.depth_buffers.get(depth)) {
            (Some(c), Some(d)) if !c.valid || !d.valid => {
                FramebufferStatus::Incomplete("attachment rejected by the driver".into())
            }
            (Some(c), Some(d)) if c.size != d.size => {
                FramebufferStatus::Incomplete("attachment sizes differ".into())
            }
            (Some(c), Some(_)) if c.size.width > max || c.size.height > max => {
                FramebufferStatus::Incomplete(format!("exceeds max texture dimension {max}"))
            }
            (Some(_), Some(_)) => FramebufferStatus::Complete,
            _ => FramebufferStatus::Incomplete("missing attachment".into()),
        };

        Ok(self.framebuffers.insert(GpuFramebuffer {
            color,
            depth,
            status,
        }))
    }

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        self.framebuffers
            .get(framebuffer)
            .map(|fb| fb.status.clone())
            .unwrap_or_else(|| FramebufferStatus::Incomplete("unknown framebuffer".into()))
    }

    fn release_framebuffer(&mut self, framebuffer: FramebufferId) {
        // Attachments are released separately by their owner.
        if let Some(fb) = self.framebuffers.remove(framebuffer) {
            log::trace!("released framebuffer ({:?}, {:?})", fb.color, fb.depth);
        }
    }

    fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut *self.errors.lock())
    }

    fn passthrough_filter(&self) -> Box<dyn FilterUnit<Self>> {
        Box::new(ShaderFilter::passthrough())
    }
}
