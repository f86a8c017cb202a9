use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::geometry::Size;

use super::{ProducerError, VideoFrame};

#[derive(Default)]
struct Mailbox {
    frame: Option<VideoFrame>,
    pending: bool,
}

/// State of one input slot shared between producers and the render thread.
///
/// The mailbox lock is held only to swap a frame in or out; uploads happen
/// after it is released.
pub(crate) struct SlotShared {
    index: usize,
    mailbox: Mutex<Mailbox>,
    buffer_size: Mutex<Size>,
    follows_output: AtomicBool,
    signals: AtomicU64,
    ingests: AtomicU64,
}

impl SlotShared {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            mailbox: Mutex::new(Mailbox::default()),
            buffer_size: Mutex::new(Size::ZERO),
            follows_output: AtomicBool::new(false),
            signals: AtomicU64::new(0),
            ingests: AtomicU64::new(0),
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    fn write(&self, frame: VideoFrame) {
        self.mailbox.lock().frame = Some(frame);
    }

    fn signal(&self) {
        self.mailbox.lock().pending = true;
        self.signals.fetch_add(1, Ordering::Relaxed);
    }

    fn submit(&self, frame: VideoFrame) {
        {
            let mut mailbox = self.mailbox.lock();
            mailbox.frame = Some(frame);
            mailbox.pending = true;
        }
        self.signals.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes the latest frame if one was signaled since the last call.
    ///
    /// Clears the pending flag either way, so any number of signals between
    /// two calls yields at most one frame.
    pub(crate) fn take_pending(&self) -> Option<VideoFrame> {
        let frame = {
            let mut mailbox = self.mailbox.lock();
            if !std::mem::take(&mut mailbox.pending) {
                return None;
            }
            mailbox.frame.take()
        };
        if frame.is_some() {
            self.ingests.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }

    pub(crate) fn buffer_size(&self) -> Size {
        *self.buffer_size.lock()
    }

    pub(crate) fn set_buffer_size(&self, size: Size) {
        *self.buffer_size.lock() = size;
    }

    pub(crate) fn follows_output(&self) -> bool {
        self.follows_output.load(Ordering::Acquire)
    }

    pub(crate) fn set_follows_output(&self, follows: bool) {
        self.follows_output.store(follows, Ordering::Release);
    }

    pub(crate) fn signals(&self) -> u64 {
        self.signals.load(Ordering::Relaxed)
    }

    pub(crate) fn ingests(&self) -> u64 {
        self.ingests.load(Ordering::Relaxed)
    }
}

/// Producer-side handle to one input slot.
///
/// Holds only a weak reference: once the compositor is dropped every call
/// fails with `ProducerError::Released`. Cheap to clone and safe to use from
/// any thread; no call ever touches the GPU.
#[derive(Debug, Clone)]
pub struct ProducerSurface {
    slot: Weak<SlotShared>,
    index: usize,
}

impl ProducerSurface {
    pub(crate) fn new(slot: &Arc<SlotShared>) -> Self {
        Self {
            slot: Arc::downgrade(slot),
            index: slot.index(),
        }
    }

    pub fn slot(&self) -> usize {
        self.index
    }

    pub fn is_released(&self) -> bool {
        self.slot.strong_count() == 0
    }

    /// Replaces the slot's frame without signaling it.
    pub fn write_frame(&self, frame: VideoFrame) -> Result<(), ProducerError> {
        self.upgrade()?.write(frame);
        Ok(())
    }

    /// Marks the last written frame as ready for the next tick.
    pub fn signal_frame_available(&self) -> Result<(), ProducerError> {
        self.upgrade()?.signal();
        Ok(())
    }

    /// Writes and signals in one step.
    pub fn submit(&self, frame: VideoFrame) -> Result<(), ProducerError> {
        self.upgrade()?.submit(frame);
        Ok(())
    }

    /// Size producers should render at: the reported input size, or the
    /// output size for overlay slots. Zero until known.
    pub fn buffer_size(&self) -> Result<Size, ProducerError> {
        Ok(self.upgrade()?.buffer_size())
    }

    fn upgrade(&self) -> Result<Arc<SlotShared>, ProducerError> {
        self.slot.upgrade().ok_or(ProducerError::Released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(shade: u8) -> VideoFrame {
        VideoFrame::solid(Size::new(2, 2), [shade, shade, shade, 255]).unwrap()
    }

    #[test]
    fn many_signals_yield_one_frame() {
        let slot = Arc::new(SlotShared::new(0));
        let producer = ProducerSurface::new(&slot);

        for shade in 0..5 {
            producer.submit(frame(shade)).unwrap();
        }

        let taken = slot.take_pending().unwrap();
        assert_eq!(taken.data()[0], 4);
        assert!(slot.take_pending().is_none());
        assert_eq!(slot.signals(), 5);
        assert_eq!(slot.ingests(), 1);
    }

    #[test]
    fn write_without_signal_is_not_pending() {
        let slot = Arc::new(SlotShared::new(0));
        let producer = ProducerSurface::new(&slot);

        producer.write_frame(frame(1)).unwrap();
        assert!(slot.take_pending().is_none());

        producer.signal_frame_available().unwrap();
        assert!(slot.take_pending().is_some());
    }

    #[test]
    fn signal_without_frame_clears_pending() {
        let slot = Arc::new(SlotShared::new(0));
        ProducerSurface::new(&slot).signal_frame_available().unwrap();
        assert!(slot.take_pending().is_none());
        assert_eq!(slot.ingests(), 0);
    }

    #[test]
    fn released_after_owner_drops() {
        let slot = Arc::new(SlotShared::new(3));
        let producer = ProducerSurface::new(&slot);
        assert_eq!(producer.slot(), 3);
        drop(slot);

        assert!(producer.is_released());
        assert_eq!(producer.submit(frame(0)), Err(ProducerError::Released));
        assert_eq!(producer.buffer_size(), Err(ProducerError::Released));
    }

    #[test]
    fn concurrent_producers_never_lose_the_flag() {
        let slot = Arc::new(SlotShared::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let producer = ProducerSurface::new(&slot);
                std::thread::spawn(move || {
                    for shade in 0..50 {
                        producer.submit(frame(shade)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(slot.take_pending().is_some());
        assert!(slot.take_pending().is_none());
        assert_eq!(slot.signals(), 200);
    }
}
