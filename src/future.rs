//! Awaiting a promise.
//!
//! The future registers an inline observer that stores the result and wakes
//! the task, so awaiting never polls the promise itself.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::context::Immediate;
use crate::{Promise, Result};

/// Future returned by awaiting a [`Promise`]. Resolves to its `Result`.
///
/// # Examples
///
/// ```
/// use promise_out::Promise;
/// use futures::executor::block_on;
/// use std::thread;
///
/// let promise = Promise::<u32>::new(|completion| {
///     thread::spawn(move || completion.fulfill(42));
///     Ok(())
/// });
/// assert_eq!(block_on(promise.settled()).unwrap(), 42);
/// ```
#[derive(Debug)]
pub struct Settled<V> {
    slot: Arc<Mutex<Slot<V>>>,
}

#[derive(Debug)]
struct Slot<V> {
    value: Option<Result<V>>,
    waker: Option<Waker>,
}

impl<V: Clone + Send + 'static> Promise<V> {
    /// Future resolving to this promise's result. `promise.await` does the
    /// same through [`IntoFuture`].
    pub fn settled(&self) -> Settled<V> {
        let slot = Arc::new(Mutex::new(Slot {
            value: None,
            waker: None,
        }));
        let filled = slot.clone();
        self.observe_on(&Immediate::context(), move |result| {
            let waker = {
                let mut slot = filled.lock();
                slot.value = Some(result);
                slot.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake()
            }
        });
        Settled { slot }
    }
}

impl<V: Clone + Send + 'static> IntoFuture for Promise<V> {
    type Output = Result<V>;
    type IntoFuture = Settled<V>;

    fn into_future(self) -> Self::IntoFuture {
        self.settled()
    }
}

impl<V> Future for Settled<V> {
    type Output = Result<V>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.lock();
        match slot.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, Promise};
    use futures::executor::block_on;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_await_settled() {
        assert_eq!(block_on(Promise::fulfilled("hi").settled()).unwrap(), "hi");
        assert!(block_on(Promise::<()>::rejected(Error::Timeout).settled())
            .unwrap_err()
            .is_timeout());
    }

    #[test]
    fn test_async_await() {
        let doubled = block_on(async {
            let value = Promise::fulfilled(21).await?;
            Ok::<_, Error>(value * 2)
        });
        assert_eq!(doubled.unwrap(), 42);
    }

    #[test]
    fn test_await_from_many_threads() {
        let mut keep = None;
        let promise = Promise::<String>::new(|completion| {
            keep = Some(completion);
            Ok(())
        });
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let promise = promise.clone();
                thread::spawn(move || block_on(promise.settled()))
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        keep.unwrap().fulfill("🍓".into());
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap().unwrap(), "🍓");
        }
    }
}
