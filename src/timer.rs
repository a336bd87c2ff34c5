//! Process-wide timer thread.
//!
//! Deadlines are registered once and the thread sleeps on a condition
//! variable until the earliest one is due, so nothing is ever busy polled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};

use crate::context::Job;

/// One pending deadline. Ties fire in registration order.
pub(crate) struct Entry {
    pub(crate) deadline: Instant,
    pub(crate) seq: u64,
    pub(crate) job: Job,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // reversed: BinaryHeap is a max-heap and we want the earliest deadline on top
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Ordered set of deadlines.
#[derive(Default)]
pub(crate) struct Timers {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl Timers {
    pub(crate) fn register(&mut self, deadline: Instant, job: Job) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { deadline, seq, job });
    }

    /// Removes and returns the earliest job whose deadline has passed.
    pub(crate) fn pop_expired(&mut self, now: Instant) -> Option<Job> {
        if self.heap.peek()?.deadline <= now {
            self.heap.pop().map(|entry| entry.job)
        } else {
            None
        }
    }

    /// Time remaining until the next deadline, if any.
    pub(crate) fn next_remaining(&self, now: Instant) -> Option<Duration> {
        self.heap
            .peek()
            .map(|entry| entry.deadline.saturating_duration_since(now))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

struct Driver {
    timers: Mutex<Timers>,
    wakeup: Condvar,
}

static DRIVER: Lazy<&'static Driver> = Lazy::new(|| {
    let driver: &'static Driver = Box::leak(Box::new(Driver {
        timers: Mutex::new(Timers::default()),
        wakeup: Condvar::new(),
    }));
    let spawned = thread::Builder::new()
        .name("promise-timer".into())
        .spawn(move || run(driver));
    if let Err(err) = spawned {
        tracing::error!(%err, "failed to start the timer thread");
    }
    driver
});

/// Runs `job` on the timer thread once `delay` has elapsed.
///
/// A delay too large to express as an `Instant` never fires; the job is
/// dropped.
pub(crate) fn schedule(delay: Duration, job: Job) {
    let Some(deadline) = Instant::now().checked_add(delay) else {
        tracing::debug!(?delay, "delay out of clock range; job will never run");
        return;
    };
    let driver = *DRIVER;
    driver.timers.lock().register(deadline, job);
    driver.wakeup.notify_one();
}

fn run(driver: &'static Driver) {
    let mut timers = driver.timers.lock();
    loop {
        let now = Instant::now();
        if let Some(job) = timers.pop_expired(now) {
            drop(timers);
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                tracing::error!("timer job panicked");
            }
            timers = driver.timers.lock();
            continue;
        }
        match timers.next_remaining(now) {
            Some(remaining) => {
                driver.wakeup.wait_for(&mut timers, remaining);
            }
            None => driver.wakeup.wait(&mut timers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_pop_expired_orders_by_deadline_then_registration() {
        let (tx, rx) = channel();
        let mut timers = Timers::default();
        let base = Instant::now();
        for (label, offset) in [("late", 20), ("first", 5), ("second", 5)] {
            let tx = tx.clone();
            timers.register(
                base + Duration::from_millis(offset),
                Box::new(move || tx.send(label).unwrap()),
            );
        }

        assert!(timers.pop_expired(base).is_none());
        assert_eq!(
            timers.next_remaining(base),
            Some(Duration::from_millis(5))
        );

        let later = base + Duration::from_millis(30);
        while let Some(job) = timers.pop_expired(later) {
            job();
        }
        assert!(timers.is_empty());
        let fired: Vec<_> = rx.try_iter().collect();
        assert_eq!(fired, vec!["first", "second", "late"]);
    }

    #[test]
    fn test_schedule_fires() {
        let (tx, rx) = channel();
        schedule(Duration::from_millis(10), Box::new(move || tx.send(1).unwrap()));
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(1));
    }
}
