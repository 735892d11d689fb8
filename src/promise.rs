//! The promise itself: a single-assignment result cell, the settlement
//! algorithm that writes it, and the chaining engine built on top.
//!
//! Continuations attached to the same promise run on independent threads and
//! may execute in any order relative to each other. Only a chain is ordered:
//! in `p.then(a, ..).then(b, ..)`, `b` never starts before `a` has returned.
//!
use crate::{
    fault,
    outcome::{FinallyOutcome, Outcome},
    signal::{Done, Signal},
    Error,
};
use std::{
    fmt,
    future::{Future, IntoFuture},
    pin::Pin,
    sync::{Arc, OnceLock},
    task::{Context, Poll},
};

/// The observable state of a [`Promise`].
#[derive(Debug, Clone, PartialEq)]
pub enum State<T> {
    Pending,
    Fulfilled(T),
    Rejected(Error),
}

/// A handle to a value that becomes available asynchronously, either as a
/// fulfillment value or as a rejection [`Error`].
///
/// A promise settles exactly once. After that, every reader sees the same
/// outcome. Cloning the handle is cheap and the clone refers to the same
/// promise.
///
/// # Examples
///
/// ```
/// use promise_chain::{Error, Promise};
///
/// let promise = Promise::resolve(42)
///     .and_then(|value: i32| {
///         if value % 2 != 0 {
///             return Err(Error::msg("odd"));
///         }
///         Ok(value * 2)
///     })
///     .catch(|_err| Ok::<_, Error>(0))
///     .finally(|| ());
/// assert_eq!(promise.wait(), Ok(84));
/// ```
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    result: OnceLock<Result<T, Error>>,
    settled: Arc<Signal>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Promise");
        match self.inner.result.get() {
            Some(Ok(value)) => debug.field("fulfilled", value),
            Some(Err(err)) => debug.field("rejected", err),
            None => debug.field("pending", &true),
        };
        debug.finish()
    }
}

/// The resolving functions handed to an executor.
///
/// Every call after the promise has settled is silently ignored. Clones
/// resolve the same promise, so several threads may race to settle it; the
/// first one wins.
pub struct Resolver<T> {
    promise: Promise<T>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Resolver {
            promise: self.promise.clone(),
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("settled", &self.promise.is_settled())
            .finish()
    }
}

impl<T> Resolver<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Fulfills the promise with `value`.
    pub fn resolve(&self, value: T) {
        self.promise.settle(Ok(value));
    }

    /// Runs the full settlement algorithm on `outcome`.
    ///
    /// A nested promise blocks the calling thread until it settles, and its
    /// outcome is adopted. A failure rejects. Resolving a promise with itself
    /// rejects with [`Error::SelfResolution`].
    pub fn resolve_with(&self, outcome: impl Into<Outcome<T>>) {
        self.promise.resolve_outcome(outcome.into());
    }

    /// Rejects the promise with `reason`.
    pub fn reject(&self, reason: impl Into<Error>) {
        self.promise.settle(Err(reason.into()));
    }

    /// The promise this resolver settles.
    pub fn promise(&self) -> &Promise<T> {
        &self.promise
    }
}

/// Default fulfillment handler: passes the value on unchanged.
pub fn identity<T>(value: T) -> Outcome<T> {
    Outcome::Value(value)
}

/// Default rejection handler: keeps the derived promise rejected with the
/// same reason.
pub fn rethrow<T>(reason: Error) -> Outcome<T> {
    Outcome::Failure(reason)
}

impl<T> Promise<T> {
    fn pending() -> Self {
        Promise {
            inner: Arc::new(Inner {
                result: OnceLock::new(),
                settled: Arc::new(Signal::default()),
            }),
        }
    }

    /// Whether two handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Promise<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.inner).cast()
    }

    /// A signal that fires once the promise settles.
    pub fn done(&self) -> Done {
        Done::new(self.inner.settled.clone())
    }

    pub fn is_settled(&self) -> bool {
        self.inner.result.get().is_some()
    }

    /// Writes the result cell and fires the settlement signal as one step.
    /// Returns `false` if the promise was already settled.
    fn settle(&self, result: Result<T, Error>) -> bool {
        let cell = &self.inner.result;
        let settled = self.inner.settled.fire_with(|| {
            let _ = cell.set(result);
        });
        if !settled {
            log::trace!("promise already settled; ignoring late settlement");
        }
        settled
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a pending promise and runs `executor` on its own thread.
    ///
    /// A panic in the executor rejects the promise (see [`Error::Panic`]).
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::Promise;
    ///
    /// let promise = Promise::new(|resolver| resolver.resolve("go"));
    /// assert_eq!(promise.wait(), Ok("go"));
    /// ```
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolver<T>) + Send + 'static,
    {
        let promise = Self::pending();
        let resolver = Resolver {
            promise: promise.clone(),
        };
        let on_fault = resolver.clone();
        fault::spawn_guarded(move || executor(resolver), move |err| on_fault.reject(err));
        promise
    }

    /// A promise already fulfilled with `value`.
    pub fn resolve(value: T) -> Self {
        let promise = Self::pending();
        promise.settle(Ok(value));
        promise
    }

    /// A promise already rejected with `reason`.
    pub fn reject(reason: impl Into<Error>) -> Self {
        let promise = Self::pending();
        promise.settle(Err(reason.into()));
        promise
    }

    /// A promise settled from `outcome`, flattening nested promises.
    ///
    /// Blocks the calling thread if `outcome` holds a promise that has not
    /// settled yet.
    pub fn settled(outcome: impl Into<Outcome<T>>) -> Self {
        let promise = Self::pending();
        promise.resolve_outcome(outcome.into());
        promise
    }

    fn resolve_outcome(&self, outcome: Outcome<T>) {
        match outcome {
            Outcome::Value(value) => {
                self.settle(Ok(value));
            }
            Outcome::Failure(err) => {
                self.settle(Err(err));
            }
            Outcome::Nested(nested) if nested.ptr_eq(self) => {
                log::debug!("promise resolved with itself");
                self.settle(Err(Error::SelfResolution));
            }
            Outcome::Nested(nested) => {
                // `nested` holds a terminal result once settled, so a
                // single wait adopts however deep the nesting went.
                self.settle(nested.wait());
            }
        }
    }

    /// The current state, without blocking.
    pub fn state(&self) -> State<T> {
        match self.inner.result.get() {
            None => State::Pending,
            Some(Ok(value)) => State::Fulfilled(value.clone()),
            Some(Err(err)) => State::Rejected(err.clone()),
        }
    }

    /// Blocks the current thread until the promise settles, then returns
    /// its outcome.
    pub fn wait(&self) -> Result<T, Error> {
        loop {
            if let Some(result) = self.inner.result.get() {
                return result.clone();
            }
            self.inner.settled.wait();
        }
    }

    /// Attaches a fulfillment and a rejection handler and returns the
    /// promise that carries the handler's outcome.
    ///
    /// Never blocks. The handler runs on its own thread once this promise
    /// settles. Whatever it returns goes through the settlement algorithm of
    /// the derived promise, so a rejection handler can recover by returning a
    /// value, and either handler can reject by returning an [`Error`] or
    /// adopt another promise by returning it.
    ///
    /// Returning this very promise from a handler rejects the derived promise
    /// with [`Error::SelfResolution`].
    ///
    /// Use [`identity`] and [`rethrow`] for a handler you don't need, or
    /// [`and_then`](Self::and_then), [`catch`](Self::catch) and
    /// [`pass`](Self::pass).
    pub fn then<U, F, R, A, B>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> A + Send + 'static,
        R: FnOnce(Error) -> B + Send + 'static,
        A: Into<Outcome<U>>,
        B: Into<Outcome<U>>,
    {
        let source = self.clone();
        Promise::new(move |resolver: Resolver<U>| {
            let outcome: Outcome<U> = match source.wait() {
                Ok(value) => on_fulfilled(value).into(),
                Err(err) => on_rejected(err).into(),
            };
            if let Outcome::Nested(ref nested) = outcome {
                if nested.addr() == source.addr() {
                    log::debug!("handler returned its own source promise");
                    resolver.reject(Error::SelfResolution);
                    return;
                }
            }
            resolver.resolve_with(outcome);
        })
    }

    /// Attaches a fulfillment handler. A rejection passes through unchanged.
    pub fn and_then<U, F, A>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> A + Send + 'static,
        A: Into<Outcome<U>>,
    {
        self.then(on_fulfilled, rethrow::<U>)
    }

    /// Attaches a rejection handler. A fulfillment passes through unchanged.
    pub fn catch<R, B>(&self, on_rejected: R) -> Promise<T>
    where
        R: FnOnce(Error) -> B + Send + 'static,
        B: Into<Outcome<T>>,
    {
        self.then(identity::<T>, on_rejected)
    }

    /// A derived promise with both handlers defaulted: it settles exactly
    /// like this one.
    pub fn pass(&self) -> Promise<T> {
        self.then(identity::<T>, rethrow::<T>)
    }

    /// Runs `on_finally` once this promise settles, whatever the outcome.
    ///
    /// The derived promise keeps this promise's outcome. The handler can only
    /// override it with a rejection, by returning an [`Error`], an `Err`, or a
    /// promise that rejects. Use `|| ()` for a no-op handler.
    pub fn finally<F, X>(&self, on_finally: F) -> Promise<T>
    where
        F: FnOnce() -> X + Send + 'static,
        X: FinallyOutcome,
    {
        let source = self.clone();
        Promise::new(move |resolver: Resolver<T>| {
            let result = source.wait();
            match on_finally().into_rejection() {
                Some(err) => resolver.reject(err),
                None => match result {
                    Ok(value) => resolver.resolve(value),
                    Err(err) => resolver.reject(err),
                },
            }
        })
    }
}

/// The future returned by awaiting a [`Promise`].
#[derive(Debug)]
pub struct Wait<T> {
    promise: Promise<T>,
    done: Done,
}

impl<T> Future for Wait<T>
where
    T: Clone,
{
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            if let Some(result) = this.promise.inner.result.get() {
                return Poll::Ready(result.clone());
            }
            if Pin::new(&mut this.done).poll(cx).is_pending() {
                return Poll::Pending;
            }
        }
    }
}

impl<T> IntoFuture for Promise<T>
where
    T: Clone,
{
    type Output = Result<T, Error>;
    type IntoFuture = Wait<T>;

    fn into_future(self) -> Self::IntoFuture {
        let done = self.done();
        Wait {
            promise: self,
            done,
        }
    }
}
