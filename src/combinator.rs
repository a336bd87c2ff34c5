//! Chaining operators. All of them are built on [`Promise::observe_on`];
//! none of them touch a promise's cell directly.
//!
//! Each operator has an `_on` form taking the context its handler runs on,
//! and a short form that uses [`main_context`].

use std::fmt::Debug;

use crate::context::{main_context, Context};
use crate::{Error, Promise, Result};

impl<V: Clone + Send + 'static> Promise<V> {
    pub fn observe<F>(&self, handler: F) -> Self
    where
        F: FnOnce(Result<V>) + Send + 'static,
    {
        self.observe_on(&main_context(), handler)
    }

    /// Chains a transform that yields another promise.
    ///
    /// The derived promise settles with the promise `transform` returns. An
    /// `Err` from `transform` rejects it, and a failure of `self` skips
    /// `transform` entirely.
    pub fn then_promise_on<W, F>(&self, context: &Context, transform: F) -> Promise<W>
    where
        W: Clone + Send + 'static,
        F: FnOnce(V) -> Result<Promise<W>> + Send + 'static,
    {
        let forward_on = context.clone();
        Promise::new(|completion| {
            self.observe_on(context, move |result| match result.and_then(transform) {
                Ok(next) => {
                    next.observe_on(&forward_on, move |result| {
                        completion.complete(result);
                    });
                }
                Err(err) => {
                    completion.fail(err);
                }
            });
            Ok(())
        })
    }

    pub fn then_promise<W, F>(&self, transform: F) -> Promise<W>
    where
        W: Clone + Send + 'static,
        F: FnOnce(V) -> Result<Promise<W>> + Send + 'static,
    {
        self.then_promise_on(&main_context(), transform)
    }

    /// Chains a value transform.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_out::{Immediate, Promise};
    ///
    /// let context = Immediate::context();
    /// let greeting = Promise::fulfilled("Hello".to_string())
    ///     .then_on(&context, |hello| Ok(hello + " World"));
    /// assert_eq!(greeting.value().as_deref(), Some("Hello World"));
    /// ```
    pub fn then_on<W, F>(&self, context: &Context, transform: F) -> Promise<W>
    where
        W: Clone + Send + 'static,
        F: FnOnce(V) -> Result<W> + Send + 'static,
    {
        self.then_promise_on(context, move |value| transform(value).map(Promise::fulfilled))
    }

    pub fn then<W, F>(&self, transform: F) -> Promise<W>
    where
        W: Clone + Send + 'static,
        F: FnOnce(V) -> Result<W> + Send + 'static,
    {
        self.then_on(&main_context(), transform)
    }

    /// Runs `handler` if the promise rejects.
    pub fn catch_on<F>(&self, context: &Context, handler: F) -> Self
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.observe_on(context, move |result| {
            if let Err(err) = result {
                handler(err)
            }
        })
    }

    pub fn catch<F>(&self, handler: F) -> Self
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.catch_on(&main_context(), handler)
    }

    /// Turns a failure into the result of the promise `handler` returns.
    /// Successes pass through untouched.
    pub fn recover_on<F>(&self, context: &Context, handler: F) -> Promise<V>
    where
        F: FnOnce(Error) -> Result<Promise<V>> + Send + 'static,
    {
        let forward_on = context.clone();
        Promise::new(|completion| {
            self.observe_on(context, move |result| match result {
                Ok(value) => {
                    completion.fulfill(value);
                }
                Err(err) => match handler(err) {
                    Ok(next) => {
                        next.observe_on(&forward_on, move |result| {
                            completion.complete(result);
                        });
                    }
                    Err(err) => {
                        completion.fail(err);
                    }
                },
            });
            Ok(())
        })
    }

    pub fn recover<F>(&self, handler: F) -> Promise<V>
    where
        F: FnOnce(Error) -> Result<Promise<V>> + Send + 'static,
    {
        self.recover_on(&main_context(), handler)
    }

    /// Runs `handler` once the promise settles either way.
    pub fn finally_on<F>(&self, context: &Context, handler: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.observe_on(context, move |_| handler())
    }

    pub fn finally<F>(&self, handler: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.finally_on(&main_context(), handler)
    }
}

impl<V: Clone + Debug + Send + 'static> Promise<V> {
    /// Forwards the value if `predicate` accepts it, otherwise rejects with
    /// [`Error::Invalid`].
    pub fn validate_on<F>(&self, context: &Context, predicate: F) -> Promise<V>
    where
        F: FnOnce(&V) -> bool + Send + 'static,
    {
        self.then_on(context, move |value| {
            if predicate(&value) {
                Ok(value)
            } else {
                Err(Error::Invalid(format!("{value:?}")))
            }
        })
    }

    pub fn validate<F>(&self, predicate: F) -> Promise<V>
    where
        F: FnOnce(&V) -> bool + Send + 'static,
    {
        self.validate_on(&main_context(), predicate)
    }
}
