use std::ffi::OsString;
use std::io;

use thiserror::Error;

/// Errors reported by launch and capture operations.
///
/// Every variant is terminal for the operation that produced it: any
/// descriptors opened for the attempt have been closed, any child that was
/// started has been killed and reaped, and output captured so far has been
/// discarded.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExecError {
    /// The program could not be located, either at the given path or on `PATH`.
    #[error("program not found: {}", .0.to_string_lossy())]
    NotFound(OsString),

    /// The program name or an argument cannot be passed to the OS.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Preparing the child's streams or argument vector failed. No process
    /// was created.
    #[error("failed to prepare child process")]
    Setup(#[source] io::Error),

    /// Creating the child process failed.
    #[error("failed to create child process")]
    Launch(#[source] io::Error),

    /// Creating the output pipe failed.
    #[error("failed to create output pipe")]
    Pipe(#[source] io::Error),

    /// Reading the child's output failed.
    #[error("I/O error reading child output")]
    Capture(#[source] io::Error),

    /// The capture buffer could not be grown.
    #[error("capture buffer could not be grown")]
    BufferGrowth,

    /// The input could not be staged in a temporary file.
    #[error("failed to stage input in a temporary file")]
    TempFile(#[source] io::Error),

    /// The capture deadline expired before the child finished.
    #[error("child process did not finish in time")]
    TimedOut,
}

impl ExecError {
    /// True if no child process was created for the failed operation.
    pub fn before_launch(&self) -> bool {
        matches!(
            self,
            ExecError::NotFound(_)
                | ExecError::InvalidArgument(_)
                | ExecError::Setup(_)
                | ExecError::Launch(_)
                | ExecError::Pipe(_)
                | ExecError::TempFile(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;
