//! Utilities composing several promises: delaying, timing out, retrying,
//! zipping and racing.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::context::{main_context, Context, Immediate};
use crate::{Error, Promise, Single, SUCCESS};

/// Fulfills once `duration` has elapsed on `context`'s clock.
pub fn delay_on(duration: Duration, context: &Context) -> Single {
    Promise::new(|completion| {
        context.execute_after(
            duration,
            Box::new(move || {
                completion.complete(SUCCESS);
            }),
        );
        Ok(())
    })
}

pub fn delay(duration: Duration) -> Single {
    delay_on(duration, &main_context())
}

/// Rejects with [`Error::Timeout`] after `duration` and never fulfills.
///
/// Meant to be raced against another promise:
///
/// ```
/// use promise_out::{promises, Error, Promise};
/// use futures::executor::block_on;
/// use std::time::Duration;
///
/// let never = Promise::<u8>::new(|_| Ok(()));
/// let raced = promises::race([never, promises::timeout(Duration::from_millis(10))]);
/// assert!(matches!(block_on(raced.settled()), Err(Error::Timeout)));
/// ```
pub fn timeout_on<V>(duration: Duration, context: &Context) -> Promise<V>
where
    V: Clone + Send + 'static,
{
    Promise::new(|completion| {
        delay_on(duration, context).finally_on(context, move || {
            completion.fail(Error::Timeout);
        });
        Ok(())
    })
}

pub fn timeout<V>(duration: Duration) -> Promise<V>
where
    V: Clone + Send + 'static,
{
    timeout_on(duration, &main_context())
}

/// Runs `generate` and, while it fails, waits `delay` and runs it again, up
/// to `attempts` extra times. The last failure is passed through with no
/// trailing wait.
pub fn retry_on<V, G>(attempts: usize, delay: Duration, context: &Context, generate: G) -> Promise<V>
where
    V: Clone + Send + 'static,
    G: Fn() -> Promise<V> + Send + Sync + 'static,
{
    retry_with(attempts, delay, context.clone(), Arc::new(generate))
}

pub fn retry<V, G>(attempts: usize, delay: Duration, generate: G) -> Promise<V>
where
    V: Clone + Send + 'static,
    G: Fn() -> Promise<V> + Send + Sync + 'static,
{
    retry_on(attempts, delay, &main_context(), generate)
}

type Generator<V> = Arc<dyn Fn() -> Promise<V> + Send + Sync>;

fn retry_with<V>(attempts: usize, delay: Duration, context: Context, generate: Generator<V>) -> Promise<V>
where
    V: Clone + Send + 'static,
{
    if attempts == 0 {
        return generate();
    }
    let recover_on = context.clone();
    generate().recover_on(&recover_on, move |err| {
        tracing::debug!(remaining = attempts, error = %err, "attempt failed; retrying");
        let next_on = context.clone();
        Ok(delay_on(delay, &context).then_promise_on(&context, move |()| {
            Ok(retry_with(attempts - 1, delay, next_on, generate))
        }))
    })
}

/// Fulfills with both values once both promises fulfill. The first failure
/// observed rejects the zip; whatever settles afterwards is ignored.
pub fn zip<A, B>(first: &Promise<A>, second: &Promise<B>) -> Promise<(A, B)>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    Promise::new(|completion| {
        let slots = Arc::new(Mutex::new((None::<A>, None::<B>)));
        let inline = Immediate::context();

        let (left, done) = (slots.clone(), completion.clone());
        first.observe_on(&inline, move |result| match result {
            Ok(a) => {
                if let Some(pair) = fill(&left, |slots| slots.0 = Some(a)) {
                    done.fulfill(pair);
                }
            }
            Err(err) => {
                done.fail(err);
            }
        });

        second.observe_on(&inline, move |result| match result {
            Ok(b) => {
                if let Some(pair) = fill(&slots, |slots| slots.1 = Some(b)) {
                    completion.fulfill(pair);
                }
            }
            Err(err) => {
                completion.fail(err);
            }
        });
        Ok(())
    })
}

type Slots<A, B> = Mutex<(Option<A>, Option<B>)>;

/// Stores one side of a zip and returns both values once both are in.
fn fill<A: Clone, B: Clone>(
    slots: &Slots<A, B>,
    store: impl FnOnce(&mut (Option<A>, Option<B>)),
) -> Option<(A, B)> {
    let mut slots = slots.lock();
    store(&mut slots);
    match &*slots {
        (Some(a), Some(b)) => Some((a.clone(), b.clone())),
        _ => None,
    }
}

pub fn zip3<A, B, C>(first: &Promise<A>, second: &Promise<B>, last: &Promise<C>) -> Promise<(A, B, C)>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    C: Clone + Send + 'static,
{
    zip(&zip(first, second), last).then_on(&Immediate::context(), |((a, b), c)| Ok((a, b, c)))
}

pub fn zip4<A, B, C, D>(
    first: &Promise<A>,
    second: &Promise<B>,
    third: &Promise<C>,
    last: &Promise<D>,
) -> Promise<(A, B, C, D)>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    C: Clone + Send + 'static,
    D: Clone + Send + 'static,
{
    zip(&zip3(first, second, third), last)
        .then_on(&Immediate::context(), |((a, b, c), d)| Ok((a, b, c, d)))
}

/// Settles with whichever input settles first, success or failure.
/// Rejects with [`Error::Race`] when given no promises.
pub fn race<V, I>(promises: I) -> Promise<V>
where
    V: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<V>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    if promises.is_empty() {
        return Promise::rejected(Error::Race);
    }
    Promise::new(|completion| {
        let inline = Immediate::context();
        for promise in &promises {
            let completion = completion.clone();
            promise.observe_on(&inline, move |result| {
                completion.complete(result);
            });
        }
        Ok(())
    })
}
