//! Where and when observer callbacks run.
//!
//! A promise never runs callbacks itself; it hands them to the
//! [`ExecutionContext`] the observer was registered with.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::queue::SerialQueue;
use crate::timer;

/// A unit of work submitted to a context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to an execution context.
pub type Context = Arc<dyn ExecutionContext>;

/// Runs submitted work under the implementor's scheduling policy.
///
/// `execute` returns without waiting for the work unless the context is
/// synchronous by design (see [`Immediate`]). A serial context runs jobs in
/// submission order; no ordering exists across different contexts.
///
/// Implementations must not silently swallow a panic raised by a job.
pub trait ExecutionContext: Send + Sync + 'static {
    fn execute(&self, work: Job);

    /// Runs `work` once `delay` has elapsed.
    ///
    /// The default hands the job to the process-wide timer thread, which runs
    /// it there when due. Contexts with their own clock should override this
    /// so the job runs on the context itself.
    fn execute_after(&self, delay: Duration, work: Job) {
        timer::schedule(delay, work);
    }
}

/// Runs every job synchronously on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct Immediate;

impl Immediate {
    pub fn context() -> Context {
        Arc::new(Immediate)
    }
}

impl ExecutionContext for Immediate {
    fn execute(&self, work: Job) {
        work()
    }
}

static MAIN: Lazy<RwLock<Context>> = Lazy::new(|| {
    let main: Context = Arc::new(SerialQueue::builder().name("main").build());
    RwLock::new(main)
});

/// Context used by every operator called without an explicit context.
///
/// Starts out as a [`SerialQueue`] named `main`.
pub fn main_context() -> Context {
    MAIN.read().clone()
}

/// Replaces the main context. Promises already observing keep the context
/// they were registered with.
pub fn set_main_context(context: Context) {
    *MAIN.write() = context;
    tracing::debug!("main execution context replaced");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::channel;
    use std::time::Instant;

    #[test]
    fn test_immediate_runs_inline() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        Immediate.execute(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_execute_after_waits() {
        let (tx, rx) = channel();
        let start = Instant::now();
        Immediate.execute_after(
            Duration::from_millis(30),
            Box::new(move || tx.send(()).unwrap()),
        );
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
