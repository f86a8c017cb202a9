//! GPU-side types shared by shader filters.

use bytemuck::{Pod, Zeroable};

use crate::geometry::Quad;

// ── blend ─────────────────────────────────────────────────────────────────

/// Offscreen passes overwrite; presentation passes blend so full-frame
/// overlays land on top of split content.
pub(super) fn blend_for(blend: bool) -> Option<wgpu::BlendState> {
    if blend {
        Some(wgpu::BlendState::ALPHA_BLENDING)
    } else {
        Some(wgpu::BlendState::REPLACE)
    }
}

// ── transform uniform ─────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct TransformUniform {
    pub transform: [f32; 16],
}

impl TransformUniform {
    pub fn new(transform: glam::Mat4) -> Self {
        Self {
            transform: transform.to_cols_array(),
        }
    }
}

// ── quad vertex ───────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct FilterVertex {
    pub pos: [f32; 2], // NDC
    pub uv: [f32; 2],
}

impl FilterVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    pub(super) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<FilterVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }

    /// Strip-ordered vertices for a quad.
    pub fn strip(quad: &Quad) -> [FilterVertex; 4] {
        std::array::from_fn(|i| FilterVertex {
            pos: quad.positions[i],
            uv: quad.tex_coords[i],
        })
    }
}
