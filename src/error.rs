//! Centralized error handling for coread.
//!
//! All fallible operations in the crate return the [`Result`] alias defined
//! here. The library never panics on runtime failures: backend I/O errors,
//! pool exhaustion, and stale-stream misuse all surface as [`CoreadError`]
//! values. The only exceptions are *programmer errors* — an invalid fan-out
//! range or a corrupt region set — which fail fast through assertions, since
//! they are not meaningful control-flow conditions for a caller to recover
//! from.
//!
//! ## Error Categories
//!
//! - **I/O Errors** ([`CoreadError::Io`]): failures surfaced by the backend
//!   during `read`/`vread`. A single backend failure invalidates the whole
//!   load cycle; there is no best-effort return of partially loaded regions.
//! - **Memory Errors** ([`CoreadError::Memory`]): the buffer pool declined an
//!   allocation, typically because a byte cap was exceeded.
//! - **Executor Errors** ([`CoreadError::Executor`]): a worker pool could not
//!   be built.
//! - **Internal Errors** ([`CoreadError::Internal`]): contract violations
//!   observed at runtime, such as reading a lazy stream that a later load
//!   invalidated. These indicate a bug in the calling reader.
//!
//! ## Cloneability
//!
//! [`CoreadError`] is `Clone` so a failure can be fanned out to every stream
//! of a dead load cycle. I/O errors are wrapped in `Arc` to keep cloning
//! cheap.
//!
//! ## Example
//!
//! ```rust
//! use coread::CoreadError;
//!
//! fn describe(err: &CoreadError) {
//!     match err {
//!         CoreadError::Io(e) => eprintln!("backend failure: {e}"),
//!         other => eprintln!("error: {other}"),
//!     }
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for coread operations.
pub type Result<T> = std::result::Result<T, CoreadError>;

/// The error type covering all failure domains in coread.
#[derive(Debug, Clone)]
pub enum CoreadError {
    /// Low-level I/O failure reported by the backend (short read, missing
    /// file, storage fault).
    ///
    /// The underlying `io::Error` is wrapped in an `Arc` to make the error
    /// `Clone`.
    Io(Arc<io::Error>),

    /// The memory pool declined a buffer allocation.
    Memory(String),

    /// A worker pool could not be constructed.
    Executor(String),

    /// A runtime contract violation, e.g. reading a lazy stream whose load
    /// cycle has been superseded. Indicates a bug in the calling reader.
    Internal(String),
}

impl fmt::Display for CoreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Memory(s) => write!(f, "memory error: {s}"),
            Self::Executor(s) => write!(f, "executor error: {s}"),
            Self::Internal(s) => write!(f, "internal error: {s}"),
        }
    }
}

impl std::error::Error for CoreadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CoreadError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
