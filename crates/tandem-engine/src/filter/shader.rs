use std::collections::HashMap;

use anyhow::{anyhow, bail, Context};
use wgpu::util::DeviceExt;

use crate::device::{RenderTarget, WgpuBackend};
use crate::geometry::Size;

use super::common::{blend_for, FilterVertex, TransformUniform};
use super::{DrawCall, FilterUnit};

const PRELUDE: &str = include_str!("shaders/prelude.wgsl");
const PASSTHROUGH: &str = include_str!("shaders/passthrough.wgsl");

/// WGSL filter for the wgpu backend.
///
/// `fragment` must define `apply_filter(color: vec4<f32>, uv: vec2<f32>) -> vec4<f32>`;
/// the prelude supplies the vertex stage, the sampling transform and the texture binding.
pub struct ShaderFilter {
    label: String,
    fragment: String,
    output_size: Size,
    state: Option<ShaderState>,
}

struct ShaderState {
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    // Keyed by target format and whether the target blends.
    pipelines: HashMap<(wgpu::TextureFormat, bool), wgpu::RenderPipeline>,
}

impl ShaderFilter {
    pub fn new(label: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            fragment: fragment.into(),
            output_size: Size::ZERO,
            state: None,
        }
    }

    /// The no-op filter.
    pub fn passthrough() -> Self {
        Self::new("passthrough", PASSTHROUGH)
    }

    pub fn output_size(&self) -> Size {
        self.output_size
    }

    fn source(&self) -> String {
        format!("{PRELUDE}\n{}", self.fragment)
    }
}

impl ShaderState {
    fn new(device: &wgpu::Device, label: &str, source: String) -> anyhow::Result<Self> {
        // Catch WGSL errors here instead of on the uncaptured handler.
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(err) = pollster::block_on(scope.pop()) {
            bail!("shader `{label}` failed to compile: {err}");
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tandem filter bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tandem filter pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        Ok(Self {
            module,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
        })
    }

    fn pipeline(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        blend: bool,
    ) -> &wgpu::RenderPipeline {
        let module = &self.module;
        let pipeline_layout = &self.pipeline_layout;
        let pipelines = &mut self.pipelines;

        pipelines.entry((format, blend)).or_insert_with(|| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("tandem filter pipeline"),
                layout: Some(pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[FilterVertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: blend_for(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        })
    }
}

impl FilterUnit<WgpuBackend> for ShaderFilter {
    fn label(&self) -> &str {
        &self.label
    }

    fn initialize(&mut self, backend: &mut WgpuBackend) -> anyhow::Result<()> {
        let device = backend
            .device()
            .ok_or_else(|| anyhow!("no device to initialize `{}` on", self.label))?;
        self.state = Some(ShaderState::new(device, &self.label, self.source())?);
        log::debug!("filter `{}` initialized", self.label);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn set_output_size(&mut self, size: Size) {
        self.output_size = size;
    }

    fn draw(&mut self, backend: &mut WgpuBackend, call: &DrawCall) -> anyhow::Result<()> {
        let state = self
            .state
            .as_mut()
            .with_context(|| format!("filter `{}` drawn before initialize", self.label))?;

        let mut pass = backend
            .pass(call.target, call.texture)
            .with_context(|| format!("no pass resources for {:?}", call.target))?;

        let vertices = FilterVertex::strip(&call.quad);
        let vertex_buffer = pass.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tandem filter vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let uniform = TransformUniform::new(call.transform);
        let uniform_buffer = pass.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tandem filter transform"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = pass.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tandem filter bind group"),
            layout: &state.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(pass.source_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(pass.sampler),
                },
            ],
        });

        let blend = call.target == RenderTarget::Presentation;
        let pipeline = state.pipeline(pass.device, pass.target_format, blend);

        let mut rpass = pass.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tandem filter pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: pass.target_view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_viewport(
            0.0,
            0.0,
            call.viewport.width.max(1) as f32,
            call.viewport.height.max(1) as f32,
            0.0,
            1.0,
        );
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        rpass.set_vertex_buffer(0, vertex_buffer.slice(..));
        rpass.draw(0..4, 0..1);

        Ok(())
    }

    fn release(&mut self, _backend: &mut WgpuBackend) {
        if self.state.take().is_some() {
            log::debug!("filter `{}` released", self.label);
        }
    }
}
