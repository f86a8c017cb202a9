/// Pixel dimensions of a texture, framebuffer or presentation surface.
///
/// Zero in either axis means "not known yet"; nothing is ever allocated at
/// such a size.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const ZERO: Size = Size::new(0, 0);

    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height, or `None` for an empty size.
    #[inline]
    pub fn aspect(self) -> Option<f32> {
        if self.is_empty() {
            None
        } else {
            Some(self.width as f32 / self.height as f32)
        }
    }

    /// Swaps the axes (a quarter-turn rotated view of the same buffer).
    #[inline]
    pub fn transposed(self) -> Self {
        Self::new(self.height, self.width)
    }

    /// RGBA8 byte length of a tightly packed buffer of this size.
    #[inline]
    pub fn rgba_len(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for Size {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_axis_is_empty() {
        assert!(Size::new(0, 10).is_empty());
        assert!(Size::new(10, 0).is_empty());
        assert!(!Size::new(1, 1).is_empty());
    }

    #[test]
    fn aspect_of_empty_is_none() {
        assert_eq!(Size::ZERO.aspect(), None);
        assert_eq!(Size::new(1920, 1080).aspect(), Some(1920.0 / 1080.0));
    }

    #[test]
    fn rgba_len_is_tightly_packed() {
        assert_eq!(Size::new(3, 2).rgba_len(), 24);
    }
}
