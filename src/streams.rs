use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, BorrowedFd, RawFd};

use crate::error::{ExecError, Result};
use crate::posix;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StandardStream {
    Input = 0,
    Output = 1,
    Error = 2,
}

impl StandardStream {
    fn is_input(self) -> bool {
        matches!(self, StandardStream::Input)
    }
}

/// Fresh descriptors for the three standard streams of a child.
///
/// Each descriptor is either a duplicate of one supplied by the caller or a
/// newly opened null device. They are owned here and closed exactly once,
/// when the value is dropped; the caller's own descriptors are never
/// touched. All three are close-on-exec and numbered above 2, so they are
/// installed into the child explicitly and never leak into it otherwise.
#[derive(Debug)]
pub struct ChildStreams {
    stdin: File,
    stdout: File,
    stderr: File,
}

fn prepare_stream(fd: Option<BorrowedFd<'_>>, which: StandardStream) -> io::Result<File> {
    match fd {
        Some(fd) => posix::dup_cloexec(fd.as_raw_fd()),
        None => posix::open_null(which.is_input()),
    }
}

impl ChildStreams {
    /// Duplicate or open the descriptors for a launch.
    ///
    /// A `None` stream is connected to the null device, opened for reading
    /// for stdin and for writing otherwise. If any of the three cannot be
    /// prepared, those already opened are closed and nothing is returned.
    pub fn prepare(
        stdin: Option<BorrowedFd<'_>>,
        stdout: Option<BorrowedFd<'_>>,
        stderr: Option<BorrowedFd<'_>>,
    ) -> Result<ChildStreams> {
        // Early return through `?` drops whatever was opened so far.
        let stdin = prepare_stream(stdin, StandardStream::Input).map_err(ExecError::Setup)?;
        let stdout = prepare_stream(stdout, StandardStream::Output).map_err(ExecError::Setup)?;
        let stderr = prepare_stream(stderr, StandardStream::Error).map_err(ExecError::Setup)?;
        Ok(ChildStreams {
            stdin,
            stdout,
            stderr,
        })
    }

    /// Raw descriptors in slot order, for use after the fork.
    pub(crate) fn raw_fds(&self) -> [RawFd; 3] {
        [
            self.stdin.as_raw_fd(),
            self.stdout.as_raw_fd(),
            self.stderr.as_raw_fd(),
        ]
    }

    /// Install the descriptors as fds 0, 1 and 2 of the current process.
    ///
    /// Runs in the forked child, so it only issues raw syscalls.
    pub(crate) fn install(fds: &[RawFd; 3]) -> bool {
        posix::install_stream(fds[StandardStream::Input as usize], 0)
            && posix::install_stream(fds[StandardStream::Output as usize], 1)
            && posix::install_stream(fds[StandardStream::Error as usize], 2)
    }
}
