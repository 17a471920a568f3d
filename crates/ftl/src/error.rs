//! Fatal/internal error channel, kept separate from in-band `throw`/`catch`.
//!
//! "Fatal" errors (allocation failure, corrupted heap) are distinguished
//! from scripted exceptions. The latter flow through
//! [`crate::exception::Thrown`] as an ordinary `Result` value; this module is
//! only for the former.

use std::fmt;

/// A resource limit tracked by a [`crate::runtime::Limits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// The coroutine's environment stack would exceed the configured recursion depth.
    Recursion { limit: usize, depth: usize },
    /// The heap would exceed the configured allocation count before the next GC.
    Allocation { limit: usize, count: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recursion { limit, depth } => {
                write!(f, "recursion depth {depth} exceeds limit {limit}")
            }
            Self::Allocation { limit, count } => {
                write!(f, "allocation count {count} exceeds limit {limit}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Internal/fatal errors: anything that is not a scripted `throw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FtlError {
    /// A resource limit configured on the owning [`crate::runtime::Runtime`] was exceeded.
    Resource(ResourceError),
    /// A heap slot was referenced after having been swept; indicates a rooting bug.
    UseAfterFree(crate::heap::HeapId),
    /// `throw` was called with no enclosing `catch` frame; carries the
    /// thrown value already rendered to text, since the heap it lived in may
    /// be gone by the time the caller reports it.
    UncaughtThrow(String),
}

impl fmt::Display for FtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(e) => write!(f, "{e}"),
            Self::UseAfterFree(id) => write!(f, "use of freed heap value {id:?}"),
            Self::UncaughtThrow(msg) => write!(f, "uncaught throw: {msg}"),
        }
    }
}

impl std::error::Error for FtlError {}

impl From<ResourceError> for FtlError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

/// Result alias used throughout the interpreter for internal/fatal failures.
pub type FtlResult<T> = Result<T, FtlError>;
