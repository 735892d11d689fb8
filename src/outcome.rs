use crate::{Error, Promise};

/// What an executor or a handler hands to the settlement algorithm.
///
/// A handler may produce a plain value, a failure, or another promise whose
/// outcome should be adopted. Anything convertible into an `Outcome` can be
/// returned from [`Promise::then`] handlers:
///
/// * `Result<T, E>` where `E: Into<Error>`: `Ok` fulfills, `Err` rejects.
/// * [`Error`]: rejects.
/// * [`Promise<T>`]: adopts that promise's outcome once it settles.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Value(T),
    Failure(Error),
    Nested(Promise<T>),
}

impl<T, E> From<Result<T, E>> for Outcome<T>
where
    E: Into<Error>,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Value(value),
            Err(err) => Outcome::Failure(err.into()),
        }
    }
}

impl<T> From<Error> for Outcome<T> {
    fn from(err: Error) -> Self {
        Outcome::Failure(err)
    }
}

impl<T> From<Promise<T>> for Outcome<T> {
    fn from(promise: Promise<T>) -> Self {
        Outcome::Nested(promise)
    }
}

/// Values a [`Promise::finally`] handler may return.
///
/// The handler's return never replaces the source's value. It can only
/// override the outcome with a rejection: an [`Error`], an `Err`, a
/// [`Outcome::Failure`], or a promise that ends up rejected.
pub trait FinallyOutcome: Send + 'static {
    /// Returns the rejection reason that overrides the source's outcome,
    /// waiting for a nested promise to settle first.
    fn into_rejection(self) -> Option<Error>;
}

impl FinallyOutcome for () {
    fn into_rejection(self) -> Option<Error> {
        None
    }
}

impl FinallyOutcome for Error {
    fn into_rejection(self) -> Option<Error> {
        Some(self)
    }
}

impl<T, E> FinallyOutcome for Result<T, E>
where
    T: Send + 'static,
    E: Into<Error> + Send + 'static,
{
    fn into_rejection(self) -> Option<Error> {
        self.err().map(Into::into)
    }
}

impl<T> FinallyOutcome for Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn into_rejection(self) -> Option<Error> {
        self.wait().err()
    }
}

impl<T> FinallyOutcome for Outcome<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn into_rejection(self) -> Option<Error> {
        match self {
            Outcome::Value(_) => None,
            Outcome::Failure(err) => Some(err),
            Outcome::Nested(promise) => promise.into_rejection(),
        }
    }
}
