use super::Size;

/// Axis-aligned rectangle in normalized device coordinates (+Y up).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NdcRect {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl NdcRect {
    /// The whole output, `[-1,1]` on both axes.
    pub const FULL: NdcRect = NdcRect::new(-1.0, -1.0, 1.0, 1.0);

    #[inline]
    pub const fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    #[inline]
    pub fn width(self) -> f32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(self) -> f32 {
        self.top - self.bottom
    }

    #[inline]
    pub fn center(self) -> (f32, f32) {
        (
            (self.left + self.right) * 0.5,
            (self.bottom + self.top) * 0.5,
        )
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Shrinks the rectangle around its center by independent factors.
    #[inline]
    pub fn scaled_about_center(self, sx: f32, sy: f32) -> Self {
        let (cx, cy) = self.center();
        let hw = self.width() * 0.5 * sx;
        let hh = self.height() * 0.5 * sy;
        Self::new(cx - hw, cy - hh, cx + hw, cy + hh)
    }

    /// True when `other` lies entirely inside `self`, with a small tolerance.
    #[inline]
    pub fn contains_rect(self, other: NdcRect) -> bool {
        const EPS: f32 = 1e-6;
        other.left >= self.left - EPS
            && other.bottom >= self.bottom - EPS
            && other.right <= self.right + EPS
            && other.top <= self.top + EPS
    }

    /// Size in pixels of this region when the output is `output` pixels.
    ///
    /// NDC spans 2 units per axis, so a region covering half the span covers
    /// half the pixels.
    pub fn pixel_size(self, output: Size) -> (f32, f32) {
        (
            self.width() * 0.5 * output.width as f32,
            self.height() * 0.5 * output.height as f32,
        )
    }

    /// Strip-ordered corners: bottom-left, bottom-right, top-left, top-right.
    #[inline]
    pub fn corners(self) -> [[f32; 2]; 4] {
        [
            [self.left, self.bottom],
            [self.right, self.bottom],
            [self.left, self.top],
            [self.right, self.top],
        ]
    }
}

impl Default for NdcRect {
    fn default() -> Self {
        Self::FULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── scaling ───────────────────────────────────────────────────────────

    #[test]
    fn scaled_about_center_keeps_center() {
        let r = NdcRect::new(-1.0, 0.0, 1.0, 1.0).scaled_about_center(0.5, 0.5);
        assert_eq!(r.center(), (0.0, 0.5));
        assert_eq!(r.width(), 1.0);
        assert_eq!(r.height(), 0.5);
    }

    #[test]
    fn scaled_rect_is_contained() {
        let outer = NdcRect::new(-1.0, -1.0, 0.0, 1.0);
        assert!(outer.contains_rect(outer.scaled_about_center(0.3, 1.0)));
        assert!(!outer.contains_rect(NdcRect::FULL));
    }

    // ── pixels ────────────────────────────────────────────────────────────

    #[test]
    fn top_half_of_portrait_output() {
        let top = NdcRect::new(-1.0, 0.0, 1.0, 1.0);
        assert_eq!(top.pixel_size(Size::new(1080, 1920)), (1080.0, 960.0));
    }

    #[test]
    fn corners_are_strip_ordered() {
        assert_eq!(
            NdcRect::FULL.corners(),
            [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]]
        );
    }
}
