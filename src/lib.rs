//! Thread-backed promises with `then`/`catch`/`finally` chaining.
//!
//! A [`Promise`] settles exactly once, either fulfilled with a value or
//! rejected with an [`Error`]. Executors and handlers each run on their own
//! thread, a panic inside one becomes a rejection, and a handler may return
//! another promise to have its outcome adopted.
//!
//! Handlers attached to the same promise may run in any order relative to
//! each other; a chain of handlers always runs in order.
//!
//! ```
//! use promise_chain::{Error, Promise};
//!
//! let promise = Promise::resolve(41)
//!     .and_then(|value: i32| {
//!         if value % 2 != 0 {
//!             return Err(Error::msg("odd"));
//!         }
//!         Ok(value)
//!     })
//!     .catch(|err| {
//!         println!("Error: {err}");
//!         Ok::<_, Error>(0)
//!     })
//!     .finally(|| println!("done!"));
//! assert_eq!(promise.wait(), Ok(0));
//! ```
//!
//! The [`run`] family offers a smaller typed surface: start a function in the
//! background and [`Task::get`] its result, optionally bounded by a
//! [`CancellationToken`].
//!
mod cancel;
mod error;
mod fault;
mod outcome;
mod promise;
mod signal;
mod task;

pub use cancel::CancellationToken;
pub use error::Error;
pub use outcome::{FinallyOutcome, Outcome};
pub use promise::{identity, rethrow, Promise, Resolver, State, Wait};
pub use signal::Done;
pub use task::{async_fn, await_task, run, AsyncFn, Task};
