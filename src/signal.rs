//! A one-shot signal that any number of waiters can observe, either by
//! blocking a thread or by awaiting [`Done`] as a future.
//!
use parking_lot::{Condvar, Mutex};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
    time::{Duration, Instant},
};

#[derive(Debug, Default)]
pub(crate) struct Signal {
    state: Mutex<Inner>,
    cond: Condvar,
}

#[derive(Debug, Default)]
struct Inner {
    fired: bool,
    next_key: u64,
    wakers: Vec<(u64, Waker)>,
}

impl Signal {
    /// Runs `write` and fires the signal as one step, unless the signal has
    /// already fired. Returns whether this call was the one that fired it.
    pub(crate) fn fire_with(&self, write: impl FnOnce()) -> bool {
        let mut state = self.state.lock();
        if state.fired {
            return false;
        }
        write();
        state.fired = true;
        let wakers = std::mem::take(&mut state.wakers);
        drop(state);
        self.cond.notify_all();
        for (_, waker) in wakers {
            waker.wake()
        }
        true
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.state.lock().fired
    }

    pub(crate) fn wait(&self) {
        let mut state = self.state.lock();
        while !state.fired {
            self.cond.wait(&mut state);
        }
    }

    /// Returns `true` if the signal fired before the deadline.
    pub(crate) fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        while !state.fired {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return state.fired;
            }
        }
        true
    }

    /// Registers the waker of `cx` under `key`, allocating a key on the
    /// first pending poll. The caller must [`deregister`](Self::deregister)
    /// the key once it stops polling.
    pub(crate) fn poll_fired(&self, cx: &mut Context<'_>, key: &mut Option<u64>) -> Poll<()> {
        let mut state = self.state.lock();
        if state.fired {
            return Poll::Ready(());
        }
        let registered = key.and_then(|key| state.wakers.iter_mut().find(|(k, _)| *k == key));
        match registered {
            Some((_, waker)) => {
                if !waker.will_wake(cx.waker()) {
                    *waker = cx.waker().clone();
                }
            }
            None => {
                let next = state.next_key;
                state.next_key += 1;
                state.wakers.push((next, cx.waker().clone()));
                *key = Some(next);
            }
        }
        Poll::Pending
    }

    pub(crate) fn deregister(&self, key: u64) {
        self.state.lock().wakers.retain(|(k, _)| *k != key);
    }

    #[cfg(test)]
    pub(crate) fn waker_count(&self) -> usize {
        self.state.lock().wakers.len()
    }
}

/// A read-only handle to a settlement signal.
///
/// `Done` resolves once, when the promise it was taken from settles. It can be
/// cloned, awaited from any executor, or waited on from a plain thread.
///
/// # Examples
///
/// ```
/// use promise_chain::Promise;
///
/// let promise = Promise::new(|resolver| resolver.resolve("go"));
/// promise.done().wait();
/// assert!(promise.is_settled());
/// ```
#[derive(Debug)]
pub struct Done {
    signal: Arc<Signal>,
    key: Option<u64>,
}

impl Done {
    pub(crate) fn new(signal: Arc<Signal>) -> Self {
        Done { signal, key: None }
    }

    /// Whether the signal has fired.
    pub fn is_done(&self) -> bool {
        self.signal.is_fired()
    }

    /// Blocks the current thread until the signal fires.
    pub fn wait(&self) {
        self.signal.wait()
    }

    /// Blocks for at most `timeout`. Returns `true` if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.signal.wait_until(Instant::now() + timeout)
    }
}

impl Clone for Done {
    fn clone(&self) -> Self {
        Done::new(self.signal.clone())
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.signal.deregister(key);
        }
    }
}

impl Future for Done {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.signal.poll_fired(cx, &mut this.key)
    }
}
