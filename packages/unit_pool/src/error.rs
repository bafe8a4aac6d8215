use std::io;

use thiserror::Error;

/// Errors that can occur when creating or operating on a [`UnitPool`][crate::UnitPool].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The pool (or the ancestor whose close cascaded into it) has been closed.
    ///
    /// This is terminal for the pool node in question. Obtain a fresh node to continue.
    #[error("pool is closed")]
    PoolClosed,

    /// The requested unit length or unit amount cannot describe a usable pool.
    #[error("invalid pool capacity: {problem}")]
    InvalidCapacity {
        /// A human-readable description of the problem.
        problem: &'static str,
    },

    /// A branch asked for more units than its parent is configured for.
    #[error(
        "storage size of the pool branch must be less than or equal to the parent pool: \
        requested {requested} units, parent is configured for {parent}"
    )]
    CapacityExceedsParent {
        /// The unit amount the branch asked for.
        requested: usize,

        /// The configured unit amount of the parent.
        parent: usize,
    },

    /// A bounded read or write gave up because its deadline passed first.
    #[error("deadline exceeded while waiting for the pool")]
    DeadlineExceeded,
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        let kind = match value {
            Error::PoolClosed => io::ErrorKind::BrokenPipe,
            Error::DeadlineExceeded => io::ErrorKind::TimedOut,
            Error::InvalidCapacity { .. } | Error::CapacityExceedsParent { .. } => {
                io::ErrorKind::InvalidInput
            }
        };

        Self::new(kind, value)
    }
}
