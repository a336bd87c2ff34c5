//! A serial dispatch queue backed by one worker thread.
//!
//! Jobs run one at a time in submission order. Delayed jobs join the back of
//! the queue once their deadline passes, so they never overtake work that was
//! already queued.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::context::{ExecutionContext, Job};
use crate::timer::Timers;

/// Builder for [`SerialQueue`].
///
/// # Example
/// ```
/// use promise_out::SerialQueue;
/// let queue = SerialQueue::builder().name("network").build();
/// assert_eq!(queue.name(), "network");
/// ```
#[derive(Debug, Clone)]
pub struct SerialQueueBuilder {
    name: String,
}

impl Default for SerialQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialQueueBuilder {
    pub fn new() -> Self {
        Self {
            name: "serial-queue".into(),
        }
    }

    /// Sets the worker thread's name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Starts the worker thread and returns the queue.
    pub fn build(self) -> SerialQueue {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                timers: Timers::default(),
                shutdown: false,
            }),
            wakeup: Condvar::new(),
        });
        let worker = shared.clone();
        let name = self.name.clone();
        if let Err(err) = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || worker.run(&name))
        {
            tracing::error!(queue = %self.name, %err, "failed to start queue worker");
        }
        SerialQueue {
            name: self.name,
            shared,
        }
    }
}

/// Serial execution context. Dropping it stops the worker once the jobs that
/// are already runnable have finished; delayed jobs not yet due are dropped.
pub struct SerialQueue {
    name: String,
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<QueueState>,
    wakeup: Condvar,
}

struct QueueState {
    jobs: VecDeque<Job>,
    timers: Timers,
    shutdown: bool,
}

impl SerialQueue {
    pub fn builder() -> SerialQueueBuilder {
        SerialQueueBuilder::new()
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self::builder().name(name).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue").field("name", &self.name).finish()
    }
}

impl ExecutionContext for SerialQueue {
    fn execute(&self, work: Job) {
        self.shared.state.lock().jobs.push_back(work);
        self.shared.wakeup.notify_one();
    }

    fn execute_after(&self, delay: Duration, work: Job) {
        let Some(deadline) = Instant::now().checked_add(delay) else {
            tracing::debug!(queue = %self.name, ?delay, "delay out of clock range; job will never run");
            return;
        };
        self.shared.state.lock().timers.register(deadline, work);
        self.shared.wakeup.notify_one();
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.wakeup.notify_one();
    }
}

impl Shared {
    fn run(&self, name: &str) {
        let mut state = self.state.lock();
        loop {
            let now = Instant::now();
            while let Some(job) = state.timers.pop_expired(now) {
                state.jobs.push_back(job);
            }
            if let Some(job) = state.jobs.pop_front() {
                drop(state);
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!(queue = name, "job panicked on serial queue");
                }
                state = self.state.lock();
                continue;
            }
            if state.shutdown {
                if !state.timers.is_empty() {
                    tracing::debug!(queue = name, "dropping delayed jobs on shutdown");
                }
                break;
            }
            match state.timers.next_remaining(now) {
                Some(remaining) => {
                    self.wakeup.wait_for(&mut state, remaining);
                }
                None => self.wakeup.wait(&mut state),
            }
        }
        tracing::trace!(queue = name, "queue worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn test_runs_in_submission_order() {
        let queue = SerialQueue::new("order");
        let (tx, rx) = channel();
        for i in 0..50 {
            let tx = tx.clone();
            queue.execute(Box::new(move || tx.send(i).unwrap()));
        }
        let seen: Vec<i32> = (0..50).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_runs_on_worker_thread() {
        let queue = SerialQueue::new("named-worker");
        let (tx, rx) = channel();
        queue.execute(Box::new(move || {
            tx.send(thread::current().name().map(str::to_owned)).unwrap()
        }));
        assert_eq!(
            rx.recv_timeout(WAIT).unwrap().as_deref(),
            Some("named-worker")
        );
    }

    #[test]
    fn test_execute_after_fires_later() {
        let queue = SerialQueue::new("delayed");
        let (tx, rx) = channel();
        let delayed = tx.clone();
        queue.execute_after(
            Duration::from_millis(40),
            Box::new(move || delayed.send("delayed").unwrap()),
        );
        queue.execute(Box::new(move || tx.send("now").unwrap()));
        assert_eq!(rx.recv_timeout(WAIT), Ok("now"));
        assert_eq!(rx.recv_timeout(WAIT), Ok("delayed"));
    }

    #[test]
    fn test_unbounded_delay_never_fires() {
        let queue = SerialQueue::new("unbounded");
        let (tx, rx) = channel();
        let never = tx.clone();
        queue.execute_after(Duration::MAX, Box::new(move || never.send("never").unwrap()));
        queue.execute(Box::new(move || tx.send("now").unwrap()));
        assert_eq!(rx.recv_timeout(WAIT), Ok("now"));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_survives_panicking_job() {
        let queue = SerialQueue::new("panics");
        let (tx, rx) = channel();
        queue.execute(Box::new(|| panic!("job failed")));
        queue.execute(Box::new(move || tx.send(()).unwrap()));
        assert!(rx.recv_timeout(WAIT).is_ok());
    }

    #[test]
    fn test_drop_drains_runnable_jobs() {
        let queue = SerialQueue::new("drain");
        let (tx, rx) = channel();
        queue.execute(Box::new(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send(()).unwrap()
        }));
        drop(queue);
        assert!(rx.recv_timeout(WAIT).is_ok());
    }
}
