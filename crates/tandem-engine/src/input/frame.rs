use bytes::Bytes;
use glam::Mat4;
use image::RgbaImage;

use crate::geometry::Size;

use super::ProducerError;

/// One RGBA8 frame, tightly packed, row 0 at the top.
///
/// The payload is reference counted, so cloning a frame does not copy pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    size: Size,
    data: Bytes,
    transform: Mat4,
}

impl VideoFrame {
    pub fn new(size: Size, data: impl Into<Bytes>) -> Result<Self, ProducerError> {
        let data = data.into();
        if size.is_empty() {
            return Err(ProducerError::InvalidFrame(format!(
                "zero-sized frame {}x{}",
                size.width, size.height
            )));
        }
        if data.len() != size.rgba_len() {
            return Err(ProducerError::InvalidFrame(format!(
                "{} bytes for {}x{} RGBA (expected {})",
                data.len(),
                size.width,
                size.height,
                size.rgba_len()
            )));
        }

        Ok(Self {
            size,
            data,
            transform: Mat4::IDENTITY,
        })
    }

    /// A frame filled with one color.
    pub fn solid(size: Size, rgba: [u8; 4]) -> Result<Self, ProducerError> {
        let data: Vec<u8> = rgba.iter().copied().cycle().take(size.rgba_len()).collect();
        Self::new(size, data)
    }

    pub fn from_image(image: RgbaImage) -> Result<Self, ProducerError> {
        let size = Size::new(image.width(), image.height());
        Self::new(size, image.into_raw())
    }

    /// Sampling transform reported by the producer, applied to texture
    /// coordinates when the frame is moved into its offscreen surface.
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        let err = VideoFrame::new(Size::new(2, 2), vec![0u8; 15]).unwrap_err();
        assert!(matches!(err, ProducerError::InvalidFrame(_)));
    }

    #[test]
    fn rejects_zero_size() {
        assert!(VideoFrame::new(Size::new(0, 4), Vec::new()).is_err());
    }

    #[test]
    fn solid_fills_every_pixel() {
        let f = VideoFrame::solid(Size::new(3, 1), [1, 2, 3, 4]).unwrap();
        assert_eq!(f.data(), &[1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4]);
        assert_eq!(f.transform(), Mat4::IDENTITY);
    }

    #[test]
    fn from_image_keeps_dimensions() {
        let f = VideoFrame::from_image(RgbaImage::new(5, 7)).unwrap();
        assert_eq!(f.size(), Size::new(5, 7));
    }
}
