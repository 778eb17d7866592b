//! Crate-wide error type.
//!
//! Buffer growth, task queue lifecycle and descriptor I/O all report through
//! [`Error`]. Socket and poller primitives stay on [`std::io::Result`] like
//! the rest of the descriptor wrappers.

use std::io;

/// Errors surfaced by the buffer, the task queue and logging setup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The buffer could not grow to hold `requested` bytes.
    ///
    /// The triggering operation left the buffer untouched.
    #[error("buffer allocation of {requested} bytes failed")]
    OutOfMemory { requested: usize },

    /// A `Display` implementation reported an error while formatting.
    #[error("formatting into buffer failed")]
    Format,

    /// `start` was called on a queue that already has workers.
    #[error("task queue `{0}` is already running")]
    AlreadyRunning(String),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    /// A global tracing subscriber was already installed.
    #[error("failed to install log subscriber: {0}")]
    Logging(String),
}

impl Error {
    /// Returns true when the underlying descriptor was simply not ready.
    ///
    /// Callers retry after the next readiness notification.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::Io(error) if error.kind() == io::ErrorKind::WouldBlock)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
