use crate::{
    signal::{Done, Signal},
    Error,
};
use futures::{executor::block_on, future::select};
use std::{
    sync::{Arc, OnceLock},
    thread,
    time::{Duration, Instant},
};

const WATCHER_THREAD_NAME: &str = "promise-deadline";

/// Interrupts a blocking [`Task::get`](crate::Task::get) without touching the
/// computation behind it.
///
/// A token is cancelled at most once, either by [`cancel`](Self::cancel) or
/// by its deadline passing. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    shared: Shared,
    // A child keeps its parent, and so the parent's deadline, alive.
    _parent: Option<CancellationToken>,
}

/// The parts of a token its watcher threads hold on to. None of them keeps
/// the token itself alive.
#[derive(Debug, Clone, Default)]
struct Shared {
    signal: Arc<Signal>,
    reason: Arc<OnceLock<Error>>,
    // Fires on cancellation or when the last handle is dropped.
    stop: Arc<Signal>,
}

impl Shared {
    fn cancel_with(&self, reason: Error) {
        let cell = &self.reason;
        if self.signal.fire_with(|| {
            let _ = cell.set(reason);
        }) {
            log::trace!("cancellation token fired");
        }
        self.stop.fire_with(|| ());
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shared.stop.fire_with(|| ());
    }
}

impl CancellationToken {
    /// A token that is only cancelled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that cancels itself with [`Error::DeadlineExceeded`] once
    /// `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A token that cancels itself with [`Error::DeadlineExceeded`] at
    /// `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        let token = Self::new();
        token.expire_at(deadline);
        token
    }

    /// A token that is cancelled whenever this one is, with the same
    /// reason, and that can also be cancelled on its own.
    pub fn child(&self) -> Self {
        let child = CancellationToken {
            inner: Arc::new(Inner {
                shared: Shared::default(),
                _parent: Some(self.clone()),
            }),
        };
        let parent = self.inner.shared.clone();
        let linked = child.inner.shared.clone();
        spawn_watcher(move || {
            block_on(select(
                Done::new(parent.stop.clone()),
                Done::new(linked.stop.clone()),
            ));
            if let Some(reason) = parent.reason.get() {
                linked.cancel_with(reason.clone());
            }
        });
        child
    }

    /// Cancels the token with [`Error::Cancelled`]. Has no effect on a token
    /// that is already cancelled.
    pub fn cancel(&self) {
        self.inner.shared.cancel_with(Error::Cancelled);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.shared.reason.get().is_some()
    }

    /// Why the token was cancelled, or `None` while it is still live.
    pub fn reason(&self) -> Option<Error> {
        self.inner.shared.reason.get().cloned()
    }

    /// A signal that fires when the token is cancelled.
    pub fn cancelled(&self) -> Done {
        Done::new(self.inner.shared.signal.clone())
    }

    fn expire_at(&self, deadline: Instant) {
        let shared = self.inner.shared.clone();
        if Instant::now() >= deadline {
            shared.cancel_with(Error::DeadlineExceeded);
            return;
        }
        spawn_watcher(move || {
            // Wakes early and exits on a manual cancel or once the token
            // is dropped.
            if !shared.stop.wait_until(deadline) {
                shared.cancel_with(Error::DeadlineExceeded);
            }
        });
    }
}

fn spawn_watcher(body: impl FnOnce() + Send + 'static) {
    if let Err(err) = thread::Builder::new()
        .name(WATCHER_THREAD_NAME.into())
        .spawn(body)
    {
        log::warn!("failed to spawn cancellation watcher: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationToken;
    use crate::{run, Error};
    use futures::executor::block_on;
    use std::{
        thread,
        time::{Duration, Instant},
    };

    #[test]
    fn test_cancel() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(Error::Cancelled));
        block_on(token.cancelled());
    }

    #[test]
    fn test_timeout() {
        let start = Instant::now();
        let token = CancellationToken::with_timeout(Duration::from_millis(20));
        token.cancelled().wait();
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(token.reason(), Some(Error::DeadlineExceeded));
    }

    #[test]
    fn test_past_deadline() {
        let token = CancellationToken::with_deadline(Instant::now());
        assert_eq!(token.reason(), Some(Error::DeadlineExceeded));
    }

    #[test]
    fn test_cancel_before_deadline() {
        let token = CancellationToken::with_timeout(Duration::from_millis(20));
        token.cancel();
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(token.reason(), Some(Error::Cancelled));
    }

    #[test]
    fn test_child() {
        let parent = CancellationToken::with_timeout(Duration::from_millis(10));
        let child = parent.child();
        assert!(child.cancelled().wait_timeout(Duration::from_secs(5)));
        assert_eq!(child.reason(), Some(Error::DeadlineExceeded));

        let parent = CancellationToken::new();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_child_of_dropped_timeout_parent() {
        let child = CancellationToken::with_timeout(Duration::from_millis(10)).child();
        assert!(child.cancelled().wait_timeout(Duration::from_secs(5)));
        assert_eq!(child.reason(), Some(Error::DeadlineExceeded));
    }

    #[test]
    fn test_drop_stops_watchers() {
        let token = CancellationToken::with_timeout(Duration::from_secs(3600));
        let child = token.child();
        let (stop, child_stop) = (
            token.inner.shared.stop.clone(),
            child.inner.shared.stop.clone(),
        );
        drop(child);
        assert!(child_stop.is_fired());
        assert!(!stop.is_fired());
        drop(token);
        assert!(stop.is_fired());
    }

    #[test]
    fn test_repeated_get_releases_wakers() {
        let token = CancellationToken::new();
        let getters: Vec<_> = (0..50)
            .map(|_| {
                let token = token.clone();
                thread::spawn(move || {
                    let task = run(|| {
                        thread::sleep(Duration::from_millis(2));
                        Ok::<_, Error>(1)
                    });
                    task.get(Some(&token))
                })
            })
            .collect();
        for getter in getters {
            assert_eq!(getter.join().expect("The getter thread has panicked"), Ok(1));
        }
        assert_eq!(token.inner.shared.signal.waker_count(), 0);
    }
}
