use std::fmt;
use std::sync::Arc;

/// Outcome of a promise: `Ok` is a success, `Err` a failure.
pub type Result<V> = std::result::Result<V, Error>;

/// The success value of a `Single` (`Promise<()>`).
pub const SUCCESS: Result<()> = Ok(());

/// Every way a promise can be rejected.
///
/// Errors are cheap to clone since one failure is handed to every observer of
/// the promise that settled with it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Error produced by a resolver or a transform. Opaque to this crate.
    #[error(transparent)]
    User(Arc<dyn std::error::Error + Send + Sync>),
    #[error("promise timed out")]
    Timeout,
    /// A `validate` predicate refused the value, rendered with `Debug`.
    #[error("invalid value: {0}")]
    Invalid(String),
    #[error("no promise won the race")]
    Race,
    /// Sentinel used by [`Promise::reject`](crate::Promise::reject).
    #[error("promise was rejected")]
    Rejected,
}

impl Error {
    /// Wraps an arbitrary error as [`Error::User`].
    pub fn user<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::User(Arc::new(err))
    }

    /// A user error that only carries a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Error::user(Message(message.into()))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Error::Rejected)
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}
