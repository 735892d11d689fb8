use std::{io, sync::Arc};

/// The reason a promise was rejected.
///
/// Reasons are shared by every waiter of a promise, so the type is cheap to
/// clone: user errors are kept behind an `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("resolve with self: unsupported operation")]
    SelfResolution,
    /// A handler or executor panicked. The panic is caught, but the process
    /// panic hook still runs first, so the default hook prints the message to
    /// stderr. Install a quieter hook with [`std::panic::set_hook`] if that is
    /// unwanted.
    #[error("panic: {0}")]
    Panic(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("failed to spawn promise task: {0}")]
    Spawn(Arc<io::Error>),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps any error as a rejection reason.
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Other(Arc::new(err))
    }

    /// A rejection reason carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    /// Returns the wrapped user error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::Other(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::SelfResolution, Error::SelfResolution)
            | (Error::Cancelled, Error::Cancelled)
            | (Error::DeadlineExceeded, Error::DeadlineExceeded) => true,
            (Error::Panic(a), Error::Panic(b)) | (Error::Message(a), Error::Message(b)) => a == b,
            (Error::Spawn(a), Error::Spawn(b)) => Arc::ptr_eq(a, b),
            // User errors are equal only when they are the same shared error.
            (Error::Other(a), Error::Other(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::new(err)
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Message(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Message(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::{fmt, io};

    #[derive(Debug)]
    struct Odd(u32);

    impl fmt::Display for Odd {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "odd number: {}", self.0)
        }
    }

    impl std::error::Error for Odd {}

    #[test]
    fn test_user_errors_compare_by_identity() {
        let a = Error::new(Odd(1));
        let b = Error::new(Odd(1));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Error::from("boom"), Error::msg("boom"));
        let err: Error = io::Error::new(io::ErrorKind::Other, "disk").into();
        assert!(err.downcast_ref::<io::Error>().is_some());
        assert_eq!(err.to_string(), "disk");
    }
}
