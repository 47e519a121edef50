//! Deferred GL work.
//!
//! GL calls are only made while the engine owns GL state: inside a *safe
//! section*. Work requested anywhere else (an image finished decoding, a node
//! was destroyed from an input handler) is queued as a [`GlTask`] and run in
//! FIFO order by [`GlTaskQueue::flush`] at the start of the next render.

use crate::backend::GlBackend;
use crate::error::GpuError;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, warn};

/// A unit of deferred GL work.
pub type GlTask<B> = Box<dyn FnOnce(&B) -> Result<(), GpuError>>;

/// Rounds after which a flush gives up and drops the remaining queue.
pub const MAX_FLUSH_ROUNDS: usize = 1000;

/// Outcome of one [`GlTaskQueue::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Tasks run, including failed ones.
    pub executed: usize,
    pub failed: usize,
    pub rounds: usize,
    /// Tasks discarded by the round guard.
    pub dropped: usize,
}

/// Single-threaded GL task queue with a safe-section depth counter.
pub struct GlTaskQueue<B: GlBackend> {
    gl: Rc<B>,
    queue: RefCell<VecDeque<GlTask<B>>>,
    depth: Cell<usize>,
    flushing: Cell<bool>,
}

impl<B: GlBackend> GlTaskQueue<B> {
    pub fn new(gl: Rc<B>) -> Rc<Self> {
        Rc::new(Self {
            gl,
            queue: RefCell::new(VecDeque::new()),
            depth: Cell::new(0),
            flushing: Cell::new(false),
        })
    }

    pub fn gl(&self) -> &Rc<B> {
        &self.gl
    }

    /// Run `task` now if GL state is owned and no flush is running, otherwise
    /// queue it. Tasks scheduled during a flush run in the flush's next round.
    pub fn schedule(&self, task: GlTask<B>) {
        if self.in_safe_section() && !self.flushing.get() {
            if let Err(e) = task(&self.gl) {
                warn!(error = %e, "GL task failed");
            }
        } else {
            self.queue.borrow_mut().push_back(task);
        }
    }

    /// Mark GL state as owned until the returned guard is dropped. Sections
    /// nest.
    pub fn enter_safe_section(self: &Rc<Self>) -> SafeSection<B> {
        self.depth.set(self.depth.get() + 1);
        SafeSection { queue: Rc::clone(self) }
    }

    pub fn in_safe_section(&self) -> bool {
        self.depth.get() > 0
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Drain the queue, including tasks enqueued by the tasks themselves.
    ///
    /// Each round takes the whole current queue. After
    /// [`MAX_FLUSH_ROUNDS`] rounds the rest of the queue is discarded.
    /// A failing task is logged and does not stop the flush.
    pub fn flush(&self) -> FlushReport {
        let mut report = FlushReport::default();
        if self.flushing.replace(true) {
            return report;
        }

        loop {
            let batch: Vec<GlTask<B>> = self.queue.borrow_mut().drain(..).collect();
            if batch.is_empty() {
                break;
            }
            if report.rounds == MAX_FLUSH_ROUNDS {
                report.dropped = batch.len() + self.queue.borrow().len();
                self.queue.borrow_mut().clear();
                warn!(
                    rounds = MAX_FLUSH_ROUNDS,
                    dropped = report.dropped,
                    "GL task flush exceeded round limit, clearing queue"
                );
                break;
            }
            report.rounds += 1;
            for task in batch {
                report.executed += 1;
                if let Err(e) = task(&self.gl) {
                    report.failed += 1;
                    warn!(error = %e, "GL task failed");
                }
            }
        }

        self.flushing.set(false);
        if report.executed > 0 {
            debug!(executed = report.executed, rounds = report.rounds, "flushed GL tasks");
        }
        report
    }

    /// Discard queued tasks without running them.
    pub fn clear(&self) -> usize {
        let mut queue = self.queue.borrow_mut();
        let n = queue.len();
        queue.clear();
        n
    }
}

/// RAII guard returned by [`GlTaskQueue::enter_safe_section`].
pub struct SafeSection<B: GlBackend> {
    queue: Rc<GlTaskQueue<B>>,
}

impl<B: GlBackend> Drop for SafeSection<B> {
    fn drop(&mut self) {
        let depth = self.queue.depth.get();
        self.queue.depth.set(depth.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessGl;

    fn queue() -> Rc<GlTaskQueue<HeadlessGl>> {
        GlTaskQueue::new(Rc::new(HeadlessGl::default()))
    }

    #[test]
    fn test_outside_safe_section_is_deferred() {
        let q = queue();
        let ran = Rc::new(Cell::new(0));
        let r = ran.clone();
        q.schedule(Box::new(move |_| {
            r.set(r.get() + 1);
            Ok(())
        }));
        assert_eq!(ran.get(), 0);
        assert_eq!(q.pending(), 1);

        let _guard = q.enter_safe_section();
        let report = q.flush();
        assert_eq!(ran.get(), 1);
        assert_eq!(report.executed, 1);
        assert_eq!(q.pending(), 0);
    }

    #[test]
    fn test_inside_safe_section_runs_immediately() {
        let q = queue();
        let ran = Rc::new(Cell::new(false));
        {
            let _guard = q.enter_safe_section();
            let r = ran.clone();
            q.schedule(Box::new(move |_| {
                r.set(true);
                Ok(())
            }));
            assert!(ran.get());
        }
        assert!(!q.in_safe_section());
    }

    #[test]
    fn test_fifo_order_and_failures_continue() {
        let q = queue();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            q.schedule(Box::new(move |_| {
                log.borrow_mut().push(i);
                if i == 1 {
                    Err(GpuError::Resource("boom".into()))
                } else {
                    Ok(())
                }
            }));
        }
        let report = q.flush();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.executed, 3);
    }

    #[test]
    fn test_tasks_scheduled_by_tasks_run_in_same_flush() {
        let q = queue();
        let ran = Rc::new(Cell::new(false));
        let inner_q = q.clone();
        let r = ran.clone();
        q.schedule(Box::new(move |_| {
            inner_q.schedule(Box::new(move |_| {
                r.set(true);
                Ok(())
            }));
            Ok(())
        }));
        let _guard = q.enter_safe_section();
        let report = q.flush();
        assert!(ran.get());
        assert_eq!(report.rounds, 2);
    }

    fn reschedule_forever(q: Rc<GlTaskQueue<HeadlessGl>>, count: Rc<Cell<usize>>) {
        let next = q.clone();
        q.schedule(Box::new(move |_| {
            count.set(count.get() + 1);
            reschedule_forever(next, count);
            Ok(())
        }));
    }

    #[test]
    fn test_runaway_flush_is_guarded() {
        let q = queue();
        let count = Rc::new(Cell::new(0));
        reschedule_forever(q.clone(), count.clone());

        let report = q.flush();
        assert_eq!(report.rounds, MAX_FLUSH_ROUNDS);
        assert_eq!(count.get(), MAX_FLUSH_ROUNDS);
        assert_eq!(report.dropped, 1);
        assert_eq!(q.pending(), 0);
    }
}
