//! Overlay bridge: a producer-drawn RGBA canvas composited as one more input.
//!
//! The overlay slot covers the full output and its buffer size follows the
//! output size. Anything that can draw into an `image::RgbaImage` can feed it.

use image::RgbaImage;

use crate::geometry::Size;
use crate::input::{ProducerError, ProducerSurface, VideoFrame};

/// Producer handle for an overlay slot.
#[derive(Debug, Clone)]
pub struct OverlaySurface {
    producer: ProducerSurface,
}

impl OverlaySurface {
    pub(crate) fn new(producer: ProducerSurface) -> Self {
        Self { producer }
    }

    pub fn slot(&self) -> usize {
        self.producer.slot()
    }

    /// Current canvas size (the output size).
    pub fn size(&self) -> Result<Size, ProducerError> {
        self.producer.buffer_size()
    }

    /// A transparent canvas at the current output size.
    pub fn lock_canvas(&self) -> Result<RgbaImage, ProducerError> {
        let size = self.size()?;
        if size.is_empty() {
            return Err(ProducerError::SizeUnknown);
        }
        Ok(RgbaImage::new(size.width, size.height))
    }

    /// Hands a drawn canvas to the compositor and signals it.
    pub fn post(&self, canvas: RgbaImage) -> Result<(), ProducerError> {
        self.producer.submit(VideoFrame::from_image(canvas)?)
    }

    /// The underlying producer surface, for callers that build frames themselves.
    pub fn producer(&self) -> &ProducerSurface {
        &self.producer
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::input::SlotShared;

    #[test]
    fn lock_canvas_requires_a_size() {
        let slot = Arc::new(SlotShared::new(2));
        let overlay = OverlaySurface::new(ProducerSurface::new(&slot));
        assert_eq!(overlay.lock_canvas(), Err(ProducerError::SizeUnknown));

        slot.set_buffer_size(Size::new(4, 3));
        let canvas = overlay.lock_canvas().unwrap();
        assert_eq!(canvas.dimensions(), (4, 3));
        assert!(canvas.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn post_goes_through_the_mailbox() {
        let slot = Arc::new(SlotShared::new(0));
        slot.set_buffer_size(Size::new(2, 2));
        let overlay = OverlaySurface::new(ProducerSurface::new(&slot));

        let mut canvas = overlay.lock_canvas().unwrap();
        canvas.put_pixel(1, 1, image::Rgba([255, 0, 0, 255]));
        overlay.post(canvas).unwrap();

        let frame = slot.take_pending().unwrap();
        assert_eq!(frame.size(), Size::new(2, 2));
        assert_eq!(&frame.data()[12..16], &[255, 0, 0, 255]);
    }
}
