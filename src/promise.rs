use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::Context;
use crate::observer::Observer;
use crate::{Error, Result, State};

/// A single-assignment result that any number of observers can watch.
///
/// Cloning a `Promise` clones the handle, not the result: every clone
/// observes the same settlement.
///
/// # Examples
///
/// ```
/// use promise_out::{Immediate, Promise};
/// use std::sync::mpsc::channel;
/// use std::thread;
///
/// let (tx, rx) = channel();
/// let promise = Promise::<String>::new(|completion| {
///     thread::spawn(move || completion.fulfill("🍓".into()));
///     Ok(())
/// });
/// promise.observe_on(&Immediate::context(), move |result| {
///     tx.send(result.unwrap()).unwrap();
/// });
/// assert_eq!(rx.recv().unwrap(), "🍓");
/// ```
pub struct Promise<V> {
    inner: Arc<Mutex<Inner<V>>>,
}

/// Write-once callback handed to a resolver. Only the first completion of a
/// promise counts; later ones are discarded.
pub struct Completion<V> {
    inner: Arc<Mutex<Inner<V>>>,
}

struct Inner<V> {
    result: Option<Result<V>>,
    observers: Vec<Observer<V>>,
}

/// Promise that only signals success or failure.
pub type Single = Promise<()>;

impl<V> Clone for Promise<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> Clone for Completion<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: Clone + Send + 'static> Promise<V> {
    /// Creates a pending promise and runs `resolver` on the calling thread.
    ///
    /// The resolver settles the promise through the [`Completion`] it is
    /// given, now or later from any thread. Returning `Err` settles the
    /// promise with that error unless it was already completed.
    pub fn new<F>(resolver: F) -> Self
    where
        F: FnOnce(Completion<V>) -> Result<()>,
    {
        let promise = Self::with_result(None);
        if let Err(err) = resolver(promise.completion()) {
            promise.complete(Err(err));
        }
        promise
    }

    pub fn fulfilled(value: V) -> Self {
        Self::with_result(Some(Ok(value)))
    }

    pub fn rejected(error: Error) -> Self {
        Self::with_result(Some(Err(error)))
    }

    fn with_result(result: Option<Result<V>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                result,
                observers: Vec::new(),
            })),
        }
    }

    pub(crate) fn completion(&self) -> Completion<V> {
        Completion {
            inner: self.inner.clone(),
        }
    }

    /// Settles the promise with the `Rejected` sentinel. Does nothing if it
    /// has already settled.
    pub fn reject(&self) {
        self.complete(Err(Error::Rejected));
    }

    fn complete(&self, result: Result<V>) -> bool {
        settle(&self.inner, result)
    }

    /// Registers `handler` to receive the final result on `context`.
    ///
    /// If the promise is already settled the handler is submitted right
    /// away; otherwise it waits for the settlement. Observers registered
    /// while pending are submitted in registration order. A handler registered
    /// on another thread while a settlement is still submitting those
    /// observers may reach a shared serial context ahead of some of them.
    pub fn observe_on<F>(&self, context: &Context, handler: F) -> Self
    where
        F: FnOnce(Result<V>) + Send + 'static,
    {
        let observer = Observer::new(context.clone(), Box::new(handler));
        let settled = {
            let mut inner = self.inner.lock();
            if let Some(result) = inner.result.clone() {
                Some((observer, result))
            } else {
                inner.observers.push(observer);
                None
            }
        };
        match settled {
            Some((observer, result)) => observer.report(result),
            None => tracing::trace!("observer registered on pending promise"),
        }
        self.clone()
    }

    pub fn state(&self) -> State<V> {
        State::from(self.inner.lock().result.as_ref())
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().result.is_none()
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self.inner.lock().result, Some(Ok(_)))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.inner.lock().result, Some(Err(_)))
    }

    pub fn value(&self) -> Option<V> {
        self.state().value()
    }

    pub fn error(&self) -> Option<Error> {
        self.state().error()
    }
}

impl Single {
    /// An already fulfilled `Single`.
    pub fn void() -> Self {
        Promise::fulfilled(())
    }
}

impl<V: Clone + Send + 'static> Completion<V> {
    /// Settles the target promise. Returns `false` if it had already settled,
    /// in which case `result` is discarded.
    pub fn complete(&self, result: Result<V>) -> bool {
        settle(&self.inner, result)
    }

    pub fn fulfill(&self, value: V) -> bool {
        self.complete(Ok(value))
    }

    pub fn fail(&self, error: Error) -> bool {
        self.complete(Err(error))
    }
}

/// The only writer of a promise's result. First writer wins.
///
/// Observers are taken out of the cell while locked and reported after the
/// lock is released, so a handler run inline may touch the same promise.
fn settle<V: Clone + Send + 'static>(inner: &Mutex<Inner<V>>, result: Result<V>) -> bool {
    let observers = {
        let mut inner = inner.lock();
        if inner.result.is_some() {
            drop(inner);
            tracing::debug!("promise already settled; discarding completion");
            return false;
        }
        inner.result = Some(result.clone());
        std::mem::take(&mut inner.observers)
    };
    tracing::trace!(
        observers = observers.len(),
        fulfilled = result.is_ok(),
        "promise settled"
    );
    for observer in observers {
        observer.report(result.clone());
    }
    true
}

impl<V: Debug> Debug for Promise<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        let mut out = f.debug_struct("Promise");
        match &inner.result {
            None => out.field("state", &"pending"),
            Some(Ok(value)) => out.field("fulfilled", value),
            Some(Err(err)) => out.field("rejected", err),
        };
        out.field("observers", &inner.observers.len()).finish()
    }
}

impl<V> Debug for Completion<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}
