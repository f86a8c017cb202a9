use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tandem_engine::compositor::{ComposedFrame, FrameHook};
use tandem_engine::{Size, WgpuBackend};

/// Asks the snapshot hook to capture the next presented frame.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTrigger {
    requested: Arc<AtomicBool>,
}

impl SnapshotTrigger {
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

/// Copy of the presentation texture waiting for its encoder to be submitted.
struct Readback {
    buffer: wgpu::Buffer,
    size: Size,
    padded_row: u32,
    bgra: bool,
}

/// Frame hook that writes the composed output to `tandem-NNN.png`.
///
/// The copy is recorded into the frame's encoder after the output pass and
/// read back at the start of the next composed frame, once the previous
/// encoder has been submitted.
pub struct SnapshotHook {
    trigger: SnapshotTrigger,
    dir: PathBuf,
    pending: Option<Readback>,
    taken: u32,
}

impl SnapshotHook {
    pub fn new(trigger: SnapshotTrigger, dir: PathBuf) -> Self {
        Self {
            trigger,
            dir,
            pending: None,
            taken: 0,
        }
    }

    fn record(&mut self, backend: &mut WgpuBackend, size: Size) -> Result<()> {
        let device = backend.device().context("no device")?.clone();
        let format = backend.surface_format().context("no surface")?;
        let frame = backend.current_frame().context("no frame in flight")?;

        let texture = &frame.surface_texture.texture;
        anyhow::ensure!(
            texture.usage().contains(wgpu::TextureUsages::COPY_SRC),
            "surface is not readable"
        );

        let padded_row = padded_row_bytes(size.width);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tandem snapshot readback"),
            size: u64::from(padded_row) * u64::from(size.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        frame.encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(size.height),
                },
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );

        self.pending = Some(Readback {
            buffer,
            size,
            padded_row,
            bgra: matches!(
                format,
                wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
            ),
        });
        Ok(())
    }

    fn save(&mut self, backend: &WgpuBackend, readback: Readback) -> Result<PathBuf> {
        let device = backend.device().context("no device")?;

        let slice = readback.buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::PollType::wait_indefinitely())?;
        receiver.recv()?.context("failed to map snapshot buffer")?;

        let mut pixels = {
            let mapped = slice.get_mapped_range();
            unpad_rows(&mapped, readback.size, readback.padded_row)
        };
        readback.buffer.unmap();
        if readback.bgra {
            bgra_to_rgba(&mut pixels);
        }

        let image = image::RgbaImage::from_raw(readback.size.width, readback.size.height, pixels)
            .context("snapshot buffer does not match its size")?;
        let path = self.dir.join(format!("tandem-{:03}.png", self.taken));
        image.save(&path).with_context(|| format!("failed to write {}", path.display()))?;
        self.taken += 1;
        Ok(path)
    }
}

impl FrameHook<WgpuBackend> for SnapshotHook {
    fn after_offscreen(&mut self, backend: &mut WgpuBackend, _frame: &ComposedFrame) {
        let Some(readback) = self.pending.take() else {
            return;
        };
        match self.save(backend, readback) {
            Ok(path) => log::info!("snapshot saved to {}", path.display()),
            Err(e) => log::warn!("snapshot failed: {e:#}"),
        }
    }

    fn after_output(&mut self, backend: &mut WgpuBackend, frame: &ComposedFrame) {
        if self.pending.is_some() || frame.output_size.is_empty() || !self.trigger.take() {
            return;
        }
        if let Err(e) = self.record(backend, frame.output_size) {
            log::warn!("snapshot skipped: {e:#}");
        }
    }
}

/// Row pitch of an RGBA8 copy, rounded up to wgpu's copy alignment.
fn padded_row_bytes(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * 4).div_ceil(align) * align
}

fn unpad_rows(data: &[u8], size: Size, padded_row: u32) -> Vec<u8> {
    let row = size.width as usize * 4;
    let mut pixels = Vec::with_capacity(size.rgba_len());
    for chunk in data.chunks(padded_row as usize).take(size.height as usize) {
        pixels.extend_from_slice(&chunk[..row]);
    }
    pixels
}

fn bgra_to_rgba(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_row_bytes(64), 256);
        assert_eq!(padded_row_bytes(65), 512);
        assert_eq!(padded_row_bytes(1), 256);
    }

    #[test]
    fn padding_is_stripped_per_row() {
        let size = Size::new(2, 2);
        let mut data = vec![0u8; 256 * 2];
        data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[256..264].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);

        let pixels = unpad_rows(&data, size, 256);
        assert_eq!(pixels, (1..=16).collect::<Vec<u8>>());
    }

    #[test]
    fn bgra_swaps_red_and_blue() {
        let mut px = vec![10, 20, 30, 40, 1, 2, 3, 4];
        bgra_to_rgba(&mut px);
        assert_eq!(px, vec![30, 20, 10, 40, 3, 2, 1, 4]);
    }

    #[test]
    fn trigger_fires_once() {
        let trigger = SnapshotTrigger::default();
        assert!(!trigger.take());
        trigger.request();
        assert!(trigger.take());
        assert!(!trigger.take());
    }
}
