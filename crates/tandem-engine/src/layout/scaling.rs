use crate::geometry::{inset_tex_coords, tex_coords_for, NdcRect, Quad, Size};

use super::{LayoutConfig, ScaleMode, SlotLayout};

/// Computes the compose-pass quad for one slot.
///
/// `source` is the slot's native size as stored (before rotation), `region`
/// its destination in NDC and `output` the presentation size in pixels.
/// Returns `None` when any size is still zero; callers keep their previous quad.
pub fn scale_quad(layout: &SlotLayout, source: Size, region: NdcRect, output: Size) -> Option<Quad> {
    if source.is_empty() || output.is_empty() || region.is_empty() {
        return None;
    }

    // Aspect of the source as displayed.
    let displayed = if layout.rotation.swaps_axes() {
        source.transposed()
    } else {
        source
    };
    let src_aspect = displayed.aspect()?;

    let (region_w, region_h) = region.pixel_size(output);
    if region_w <= 0.0 || region_h <= 0.0 {
        return None;
    }
    let dst_aspect = region_w / region_h;

    let tex = tex_coords_for(layout.rotation, layout.flip_horizontal, layout.flip_vertical);

    let quad = match layout.scale {
        ScaleMode::Fit => {
            let positions = if src_aspect > dst_aspect {
                region.scaled_about_center(1.0, dst_aspect / src_aspect)
            } else {
                region.scaled_about_center(src_aspect / dst_aspect, 1.0)
            };
            Quad::new(positions, tex)
        }
        ScaleMode::Crop => {
            // Inset along the displayed axis that overflows.
            let (inset_x, inset_y) = if src_aspect > dst_aspect {
                ((1.0 - dst_aspect / src_aspect) * 0.5, 0.0)
            } else {
                (0.0, (1.0 - src_aspect / dst_aspect) * 0.5)
            };
            // A quarter turn maps displayed x onto source v.
            let (inset_u, inset_v) = if layout.rotation.swaps_axes() {
                (inset_y, inset_x)
            } else {
                (inset_x, inset_y)
            };
            Quad::new(region, inset_tex_coords(tex, inset_u, inset_v))
        }
    };

    Some(quad)
}

/// Per-slot quad cache, recomputed when marked dirty.
///
/// Lives on the render thread. A slot whose inputs are degenerate keeps
/// whatever quad it had before.
#[derive(Debug, Clone)]
pub struct LayoutResolver {
    quads: Vec<Quad>,
    dirty: bool,
}

impl LayoutResolver {
    pub fn new(slot_count: usize) -> Self {
        Self {
            quads: vec![Quad::full_frame(); slot_count],
            dirty: true,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn quad(&self, slot: usize) -> Option<&Quad> {
        self.quads.get(slot)
    }

    /// Recomputes every slot when dirty. Returns true if a recompute ran.
    ///
    /// `sources[i]` is slot `i`'s native size.
    pub fn resolve(&mut self, config: &LayoutConfig, sources: &[Size], output: Size) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;

        for (slot, quad) in self.quads.iter_mut().enumerate() {
            let (Some(layout), Some(region)) = (config.slots.get(slot), config.region_for(slot)) else {
                continue;
            };
            let source = sources.get(slot).copied().unwrap_or_default();
            match scale_quad(layout, source, region, output) {
                Some(q) => *quad = q,
                None => log::trace!("slot {slot}: layout deferred (source {source:?}, output {output:?})"),
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rotation;
    use crate::layout::SplitDirection;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn crop() -> SlotLayout {
        SlotLayout {
            scale: ScaleMode::Crop,
            ..SlotLayout::default()
        }
    }

    // ── fit ───────────────────────────────────────────────────────────────

    #[test]
    fn fit_letterboxes_wide_source() {
        let q = scale_quad(&SlotLayout::default(), Size::new(1920, 1080), NdcRect::FULL, Size::new(1000, 1000)).unwrap();
        let b = q.bounds();
        assert!(approx(b.width(), 2.0));
        assert!(approx(b.height(), 2.0 * 1080.0 / 1920.0));
        assert_eq!(b.center(), (0.0, 0.0));
        assert_eq!(q.tex_bounds(), (0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn fit_pillarboxes_tall_source() {
        let q = scale_quad(&SlotLayout::default(), Size::new(1080, 1920), NdcRect::FULL, Size::new(1920, 1080)).unwrap();
        let b = q.bounds();
        assert!(approx(b.height(), 2.0));
        assert!(b.width() < 2.0);
        assert!(NdcRect::FULL.contains_rect(b));
    }

    #[test]
    fn fit_stays_inside_region_for_all_rotations() {
        let region = NdcRect::new(-1.0, -1.0, 0.0, 1.0);
        for rotation in [Rotation::Normal, Rotation::Rotate90, Rotation::Rotate180, Rotation::Rotate270] {
            let layout = SlotLayout { rotation, ..SlotLayout::default() };
            let q = scale_quad(&layout, Size::new(640, 480), region, Size::new(1280, 720)).unwrap();
            assert!(region.contains_rect(q.bounds()), "{rotation:?}");
            assert_eq!(q.tex_bounds(), (0.0, 0.0, 1.0, 1.0));
        }
    }

    #[test]
    fn fit_rotated_source_uses_transposed_aspect() {
        // 1080x1920 turned a quarter is 1920x1080: exact match for a 16:9 output.
        let layout = SlotLayout { rotation: Rotation::Rotate90, ..SlotLayout::default() };
        let q = scale_quad(&layout, Size::new(1080, 1920), NdcRect::FULL, Size::new(1920, 1080)).unwrap();
        assert_eq!(q.bounds(), NdcRect::FULL);
    }

    // ── crop ──────────────────────────────────────────────────────────────

    #[test]
    fn crop_keeps_region_and_insets_symmetrically() {
        let region = NdcRect::new(0.0, -1.0, 1.0, 1.0);
        let q = scale_quad(&crop(), Size::new(1920, 1080), region, Size::new(1280, 720)).unwrap();
        assert_eq!(q.bounds(), region);

        let (u0, v0, u1, v1) = q.tex_bounds();
        assert!(u0 > 0.0 && approx(u0, 1.0 - u1));
        assert_eq!((v0, v1), (0.0, 1.0));
    }

    #[test]
    fn crop_rotated_moves_inset_to_source_v() {
        // Wide source turned a quarter is tall in a square region: the displayed
        // height overflows, and displayed y runs along source u.
        let layout = SlotLayout { rotation: Rotation::Rotate90, ..crop() };
        let q = scale_quad(&layout, Size::new(1920, 1080), NdcRect::FULL, Size::new(1000, 1000)).unwrap();
        let (u0, v0, u1, v1) = q.tex_bounds();
        assert_eq!((v0, v1), (0.0, 1.0));
        assert!(approx(u0, (1.0 - 1080.0 / 1920.0) * 0.5));
        assert!(approx(u1, 1.0 - u0));
    }

    #[test]
    fn crop_same_aspect_is_identity() {
        let q = scale_quad(&crop(), Size::new(1280, 720), NdcRect::FULL, Size::new(1920, 1080)).unwrap();
        assert_eq!(q, Quad::full_frame());
    }

    // ── degenerate ────────────────────────────────────────────────────────

    #[test]
    fn zero_sizes_defer() {
        let l = SlotLayout::default();
        assert!(scale_quad(&l, Size::ZERO, NdcRect::FULL, Size::new(10, 10)).is_none());
        assert!(scale_quad(&l, Size::new(10, 10), NdcRect::FULL, Size::ZERO).is_none());
    }

    #[test]
    fn resolver_keeps_previous_quad_when_degenerate() {
        let cfg = LayoutConfig::new(1).with_scale(ScaleMode::Fit);
        let mut resolver = LayoutResolver::new(1);

        assert!(resolver.resolve(&cfg, &[Size::new(1920, 1080)], Size::new(1000, 1000)));
        let before = *resolver.quad(0).unwrap();
        assert_ne!(before, Quad::full_frame());

        resolver.mark_dirty();
        assert!(resolver.resolve(&cfg, &[Size::ZERO], Size::new(1000, 1000)));
        assert_eq!(*resolver.quad(0).unwrap(), before);
    }

    #[test]
    fn resolver_only_runs_when_dirty() {
        let cfg = LayoutConfig::new(2);
        let mut resolver = LayoutResolver::new(2);
        assert!(resolver.resolve(&cfg, &[], Size::new(4, 4)));
        assert!(!resolver.resolve(&cfg, &[], Size::new(4, 4)));
    }

    // ── scenario ──────────────────────────────────────────────────────────

    #[test]
    fn portrait_output_vertical_split_crop() {
        let cfg = LayoutConfig::new(2)
            .with_split(SplitDirection::Vertical)
            .with_scale(ScaleMode::Crop);
        let mut resolver = LayoutResolver::new(2);
        resolver.resolve(&cfg, &[Size::new(1920, 1080), Size::new(1080, 1920)], Size::new(1080, 1920));

        // Slot 0: 16:9 source into a 1080x960 region overflows horizontally.
        let q0 = resolver.quad(0).unwrap();
        assert_eq!(q0.bounds(), NdcRect::new(-1.0, 0.0, 1.0, 1.0));
        let (u0, v0, u1, v1) = q0.tex_bounds();
        let expected = (1.0 - (1080.0 / 960.0) / (1920.0 / 1080.0)) * 0.5;
        assert!(approx(u0, expected));
        assert!(approx(u1, 1.0 - expected));
        assert_eq!((v0, v1), (0.0, 1.0));

        // Slot 1: portrait source overflows vertically, centered.
        let q1 = resolver.quad(1).unwrap();
        assert_eq!(q1.bounds(), NdcRect::new(-1.0, -1.0, 1.0, 0.0));
        let (u0, v0, u1, v1) = q1.tex_bounds();
        assert_eq!((u0, u1), (0.0, 1.0));
        assert!(approx(v0, 0.25));
        assert!(approx(v1, 0.75));
    }
}
