use crate::{Error, Result};

/// Snapshot of a promise's settlement.
#[derive(Debug, Clone)]
pub enum State<V> {
    Pending,
    Fulfilled(V),
    Rejected(Error),
}

impl<V> State<V> {
    pub fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, State::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, State::Rejected(_))
    }

    pub fn value(self) -> Option<V> {
        match self {
            State::Fulfilled(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(self) -> Option<Error> {
        match self {
            State::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

impl<V: Clone> From<Option<&Result<V>>> for State<V> {
    fn from(result: Option<&Result<V>>) -> Self {
        match result {
            None => State::Pending,
            Some(Ok(value)) => State::Fulfilled(value.clone()),
            Some(Err(err)) => State::Rejected(err.clone()),
        }
    }
}
