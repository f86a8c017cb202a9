use crossbeam_queue::SegQueue;

use crate::device::Backend;

use super::Pipeline;

/// Work scheduled onto the render thread.
pub type Task<B> = Box<dyn FnOnce(&mut Pipeline<B>) + Send>;

/// Multi-producer FIFO drained only by the render thread.
pub(crate) struct TaskQueue<B: Backend> {
    queue: SegQueue<Task<B>>,
}

impl<B: Backend> TaskQueue<B> {
    pub(crate) fn new() -> Self {
        Self {
            queue: SegQueue::new(),
        }
    }

    pub(crate) fn push(&self, task: Task<B>) {
        self.queue.push(task);
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Runs the tasks present when the drain starts, in order.
    ///
    /// Tasks enqueued while draining (including by the tasks themselves) wait
    /// for the next drain. Returns how many ran.
    pub(crate) fn drain(&self, pipeline: &mut Pipeline<B>) -> usize {
        let count = self.queue.len();
        let mut ran = 0;
        while ran < count {
            let Some(task) = self.queue.pop() else {
                break;
            };
            task(pipeline);
            ran += 1;
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::compositor::CompositorConfig;
    use crate::device::{HeadlessBackend, HeadlessSurface};

    fn pipeline() -> Pipeline<HeadlessBackend> {
        Pipeline::new(
            HeadlessBackend::new(),
            HeadlessSurface::new(0),
            &[],
            &CompositorConfig::default(),
        )
    }

    #[test]
    fn drains_in_submission_order() {
        let queue = TaskQueue::<HeadlessBackend>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let log = log.clone();
            queue.push(Box::new(move |_| log.lock().push(i)));
        }

        assert_eq!(queue.drain(&mut pipeline()), 5);
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn tasks_enqueued_during_drain_wait_for_the_next_one() {
        let queue = Arc::new(TaskQueue::<HeadlessBackend>::new());
        let ran = Arc::new(Mutex::new(0));

        let inner_queue = queue.clone();
        let inner_ran = ran.clone();
        queue.push(Box::new(move |_| {
            let ran = inner_ran.clone();
            inner_queue.push(Box::new(move |_| *ran.lock() += 1));
        }));

        let mut p = pipeline();
        assert_eq!(queue.drain(&mut p), 1);
        assert_eq!(*ran.lock(), 0);
        assert_eq!(queue.drain(&mut p), 1);
        assert_eq!(*ran.lock(), 1);
    }
}
