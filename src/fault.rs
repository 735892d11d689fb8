//! Runs promise executors and handlers on their own threads and turns any
//! panic raised by user code into a rejection.
//!
use crate::Error;
use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
};

const TASK_THREAD_NAME: &str = "promise-task";

/// Spawns `body` on a fresh task thread.
///
/// `on_fault` receives the rejection reason if `body` panics, or if no
/// thread could be started at all. In the latter case it runs on the
/// calling thread.
pub(crate) fn spawn_guarded<B, F>(body: B, on_fault: F)
where
    B: FnOnce() + Send + 'static,
    F: FnOnce(Error) + Send + Clone + 'static,
{
    let on_spawn_error = on_fault.clone();
    let spawned = thread::Builder::new()
        .name(TASK_THREAD_NAME.into())
        .spawn(move || {
            log::trace!("promise task started");
            if let Err(err) = catch_fault(body) {
                log::debug!("promise task faulted: {err}");
                on_fault(err);
            }
        });
    if let Err(err) = spawned {
        log::warn!("failed to spawn promise task: {err}");
        on_spawn_error(Error::Spawn(Arc::new(err)));
    }
}

/// Runs `body`, converting a panic into the reason it should reject with.
///
/// The panic hook is left alone and still reports the panic before it is
/// caught here.
pub(crate) fn catch_fault<R>(body: impl FnOnce() -> R) -> Result<R, Error> {
    panic::catch_unwind(AssertUnwindSafe(body)).map_err(reason_from_payload)
}

/// Payloads that already are rejection reasons (or boxed errors) are kept as
/// they are. Anything else is rendered as `panic: <payload>`.
pub(crate) fn reason_from_payload(payload: Box<dyn Any + Send>) -> Error {
    let payload = match payload.downcast::<Error>() {
        Ok(err) => return *err,
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<Box<dyn std::error::Error + Send + Sync>>() {
        Ok(err) => return Error::Other(Arc::from(*err)),
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<io::Error>() {
        Ok(err) => return Error::new(*err),
        Err(payload) => payload,
    };
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        return Error::Panic((*message).to_owned());
    }
    match payload.downcast::<String>() {
        Ok(message) => Error::Panic(*message),
        Err(_) => Error::Panic("Box<dyn Any>".to_owned()),
    }
}
