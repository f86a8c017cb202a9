use super::rotation::tex_coords_for;
use super::{NdcRect, Rotation};

/// Vertex positions of the full output, strip ordered.
pub const FULL_FRAME_POSITIONS: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]];

/// Four vertex positions plus four texture coordinates, triangle-strip order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quad {
    pub positions: [[f32; 2]; 4],
    pub tex_coords: [[f32; 2]; 4],
}

impl Quad {
    /// Whole target, whole texture, no rotation. Used for every offscreen pass.
    pub fn full_frame() -> Self {
        Self {
            positions: FULL_FRAME_POSITIONS,
            tex_coords: tex_coords_for(Rotation::Normal, false, false),
        }
    }

    pub fn new(region: NdcRect, tex_coords: [[f32; 2]; 4]) -> Self {
        Self {
            positions: region.corners(),
            tex_coords,
        }
    }

    /// Bounding rectangle of the vertex positions.
    pub fn bounds(&self) -> NdcRect {
        let xs = self.positions.map(|p| p[0]);
        let ys = self.positions.map(|p| p[1]);
        NdcRect::new(
            xs.iter().copied().fold(f32::INFINITY, f32::min),
            ys.iter().copied().fold(f32::INFINITY, f32::min),
            xs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            ys.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        )
    }

    /// `(min_u, min_v, max_u, max_v)` of the texture coordinates.
    pub fn tex_bounds(&self) -> (f32, f32, f32, f32) {
        let us = self.tex_coords.map(|t| t[0]);
        let vs = self.tex_coords.map(|t| t[1]);
        (
            us.iter().copied().fold(f32::INFINITY, f32::min),
            vs.iter().copied().fold(f32::INFINITY, f32::min),
            us.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            vs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        )
    }
}

impl Default for Quad {
    fn default() -> Self {
        Self::full_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_frame_covers_everything() {
        let q = Quad::full_frame();
        assert_eq!(q.bounds(), NdcRect::FULL);
        assert_eq!(q.tex_bounds(), (0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn new_uses_region_corners() {
        let region = NdcRect::new(-1.0, 0.0, 1.0, 1.0);
        let q = Quad::new(region, Quad::full_frame().tex_coords);
        assert_eq!(q.bounds(), region);
    }
}
