//! Single-assignment promises.
//!
//! A [`Promise`] is settled exactly once, by a value or an [`Error`]. Any
//! number of observers, registered before or after settlement, each receive
//! the result exactly once on the [`ExecutionContext`] they chose.
//!
//! ```
//! use promise_out::{Immediate, Promise};
//! use std::sync::mpsc::channel;
//!
//! let context = Immediate::context();
//! let (tx, rx) = channel();
//! Promise::<String>::new(|completion| {
//!     completion.fulfill("Hello".into());
//!     Ok(())
//! })
//! .then_on(&context, |hello| Ok(hello + " World"))
//! .then_on(&context, move |greeting| Ok(tx.send(greeting).unwrap()))
//! .catch_on(&context, |err| panic!("unexpected {err}"));
//!
//! assert_eq!(rx.recv().unwrap(), "Hello World");
//! ```

mod combinator;
pub mod context;
mod error;
mod future;
mod observer;
mod promise;
pub mod promises;
pub mod queue;
mod state;
mod timer;

pub use context::{main_context, set_main_context, Context, ExecutionContext, Immediate, Job};
pub use error::{Error, Result, SUCCESS};
pub use future::Settled;
pub use promise::{Completion, Promise, Single};
pub use queue::{SerialQueue, SerialQueueBuilder};
pub use state::State;
