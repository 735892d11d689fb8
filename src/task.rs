//! A typed convenience layer: run one fallible function in the background and
//! wait for its result, optionally giving up early.
//!
use crate::{CancellationToken, Done, Error, Promise};
use futures::{
    executor::block_on,
    future::{select, Either},
};
use std::{fmt, sync::Arc};

/// The eventual result of a function started with [`run`].
///
/// Only waiting is exposed here. Use [`promise`](Self::promise) to chain
/// further work.
#[derive(Debug, Clone)]
pub struct Task<T> {
    promise: Promise<T>,
}

/// Calls `f` on its own thread and returns a [`Task`] for its result.
///
/// `Ok` fulfills the task, `Err` rejects it, and a panic rejects it with
/// [`Error::Panic`].
///
/// # Examples
///
/// ```
/// use promise_chain::{run, Error};
///
/// let task = run(|| Ok::<_, Error>(42));
/// assert_eq!(task.get(None), Ok(42));
/// ```
pub fn run<T, E, F>(f: F) -> Task<T>
where
    T: Clone + Send + Sync + 'static,
    E: Into<Error>,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    Task {
        promise: Promise::new(move |resolver| match f() {
            Ok(value) => resolver.resolve(value),
            Err(err) => resolver.reject(err),
        }),
    }
}

impl<T> Task<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Blocks until the task settles or `token` is cancelled, whichever
    /// comes first. `None` waits indefinitely.
    ///
    /// Giving up on the wait leaves the function running; its result is
    /// still recorded and later calls can observe it. Any number of threads
    /// may call `get` at once and all of them see the same result.
    pub fn get(&self, token: Option<&CancellationToken>) -> Result<T, Error> {
        let Some(token) = token else {
            return self.promise.wait();
        };
        match block_on(select(self.promise.done(), token.cancelled())) {
            Either::Left(((), _)) => self.promise.wait(),
            Either::Right(((), _)) => Err(token.reason().unwrap_or(Error::Cancelled)),
        }
    }

    /// A signal that fires once the task settles.
    pub fn done(&self) -> Done {
        self.promise.done()
    }

    /// The promise behind this task.
    pub fn promise(&self) -> &Promise<T> {
        &self.promise
    }

    pub fn into_promise(self) -> Promise<T> {
        self.promise
    }
}

/// A function that starts a fresh [`Task`] every time it is called.
pub struct AsyncFn<T> {
    f: Arc<dyn Fn() -> Task<T> + Send + Sync>,
}

impl<T> Clone for AsyncFn<T> {
    fn clone(&self) -> Self {
        AsyncFn { f: self.f.clone() }
    }
}

impl<T> fmt::Debug for AsyncFn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFn").finish_non_exhaustive()
    }
}

impl<T> AsyncFn<T> {
    pub fn call(&self) -> Task<T> {
        (self.f)()
    }
}

/// Turns a plain fallible function into one that runs in the background.
///
/// # Examples
///
/// ```
/// use promise_chain::{async_fn, await_task, Error};
///
/// let answer = async_fn(|| Ok::<_, Error>(42));
/// assert_eq!(await_task(None, &answer.call()), Ok(42));
/// ```
pub fn async_fn<T, E, F>(f: F) -> AsyncFn<T>
where
    T: Clone + Send + Sync + 'static,
    E: Into<Error>,
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    AsyncFn {
        f: Arc::new(move || {
            let f = f.clone();
            run(move || f())
        }),
    }
}

/// Waits for `task`, like [`Task::get`].
pub fn await_task<T>(token: Option<&CancellationToken>, task: &Task<T>) -> Result<T, Error>
where
    T: Clone + Send + Sync + 'static,
{
    task.get(token)
}
