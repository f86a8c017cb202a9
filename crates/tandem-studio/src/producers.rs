use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use image::Rgba;
use tandem_engine::{OverlaySurface, ProducerError, ProducerSurface, Size, VideoFrame};

#[derive(Debug, Copy, Clone)]
pub enum Pattern {
    /// Horizontal hue sweep scrolling left.
    Sweep,
    /// Checkerboard drifting diagonally.
    Checker,
}

/// Synthetic producer running on its own thread until dropped.
pub struct PatternProducer {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PatternProducer {
    pub fn spawn(
        surface: ProducerSurface,
        size: Size,
        pattern: Pattern,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name(format!("producer-{}", surface.slot()))
            .spawn(move || {
                let mut phase = 0u32;
                while !flag.load(Ordering::Relaxed) {
                    let frame = VideoFrame::new(size, render(pattern, size, phase));
                    match frame.and_then(|f| surface.submit(f)) {
                        Ok(()) => {}
                        Err(ProducerError::Released) => break,
                        Err(e) => {
                            log::warn!("slot {}: {e}", surface.slot());
                            break;
                        }
                    }
                    phase = phase.wrapping_add(1);
                    std::thread::sleep(interval);
                }
                log::debug!("producer for slot {} finished", surface.slot());
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for PatternProducer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn render(pattern: Pattern, size: Size, phase: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(size.rgba_len());
    for y in 0..size.height {
        for x in 0..size.width {
            let px = match pattern {
                Pattern::Sweep => hue(((x + phase * 4) % size.width.max(1)) as f32 / size.width.max(1) as f32),
                Pattern::Checker => {
                    let on = ((x + phase) / 32 + (y + phase) / 32) % 2 == 0;
                    if on { [235, 235, 235, 255] } else { [30, 30, 40, 255] }
                }
            };
            data.extend_from_slice(&px);
        }
    }
    data
}

fn hue(t: f32) -> [u8; 4] {
    let h = t * 6.0;
    let x = 1.0 - ((h % 2.0) - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8, 255]
}

/// Draws a bouncing box into the overlay canvas.
pub struct OverlayProducer {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl OverlayProducer {
    pub fn spawn(overlay: OverlaySurface, interval: Duration) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("producer-overlay".into())
            .spawn(move || {
                let mut phase = 0u32;
                while !flag.load(Ordering::Relaxed) {
                    match overlay.lock_canvas() {
                        Ok(mut canvas) => {
                            let (w, h) = canvas.dimensions();
                            let side = (w.min(h) / 6).max(1);
                            let ox = bounce(phase * 3, w.saturating_sub(side));
                            let oy = bounce(phase * 2, h.saturating_sub(side));
                            for y in oy..oy + side {
                                for x in ox..ox + side {
                                    canvas.put_pixel(x, y, Rgba([255, 200, 0, 180]));
                                }
                            }
                            if let Err(ProducerError::Released) = overlay.post(canvas) {
                                break;
                            }
                        }
                        Err(ProducerError::SizeUnknown) => {}
                        Err(_) => break,
                    }
                    phase = phase.wrapping_add(1);
                    std::thread::sleep(interval);
                }
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for OverlayProducer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Triangle wave in `0..=span`.
fn bounce(t: u32, span: u32) -> u32 {
    if span == 0 {
        return 0;
    }
    let period = span * 2;
    let t = t % period;
    if t <= span { t } else { period - t }
}
