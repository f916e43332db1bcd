// MIT/Apache2 License

//! Error types for the runtime.

use std::{borrow::Cow, io};
use thiserror::Error;

/// The result type used throughout this crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// An error raised by the runtime or by one of its native backends.
#[derive(Debug, Error)]
pub enum Error {
    /// A native library could not be loaded.
    #[error("unable to load {library}: {reason}")]
    Library {
        library: &'static str,
        reason: String,
    },
    /// The connection to the display server is broken.
    #[error("display connection error: {0}")]
    Connection(&'static str),
    /// The display server rejected a request.
    #[error("display server returned error code {code} for request opcode {major_opcode}")]
    Request { code: u8, major_opcode: u8 },
    /// An operating system call failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The window handle was closed, or never belonged to this run.
    #[error("window handle is no longer valid")]
    InvalidHandle,
    /// Any other failure.
    #[error("{0}")]
    Msg(Cow<'static, str>),
}

impl Error {
    #[cfg(feature = "x11")]
    pub(crate) fn make_msg(msg: impl Into<Cow<'static, str>>) -> Self {
        Error::Msg(msg.into())
    }
}

/// Why a call to `execute` or `execute_async` did not run its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ExecError {
    /// The event loop is quitting and no longer accepts work.
    #[error("the event loop is no longer accepting work")]
    Canceled,
    /// The exec queue could not accept the record.
    #[error("the exec queue could not accept the record")]
    Failed,
}

/// How a call to [`run`](crate::run) ended.
#[derive(Debug)]
pub enum RunResult {
    /// The loop exited because `quit` was requested.
    Quit,
    /// A native resource could not be acquired. No callbacks were invoked.
    InitFailed(Error),
    /// The native event source failed while running. The loop was torn down
    /// as if `quit` had been called.
    IoFailed(Error),
}

impl RunResult {
    /// Whether the loop exited because `quit` was requested.
    pub fn is_quit(&self) -> bool {
        matches!(self, RunResult::Quit)
    }

    /// Convert into a plain `Result`, discarding the phase of a failure.
    pub fn into_result(self) -> Result<()> {
        match self {
            RunResult::Quit => Ok(()),
            RunResult::InitFailed(err) | RunResult::IoFailed(err) => Err(err),
        }
    }
}
