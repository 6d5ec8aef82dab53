use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{BorrowedFd, RawFd};
use std::path::Path;

use tracing::debug;

use crate::argv::ArgumentVector;
use crate::error::{ExecError, Result};
use crate::posix;
use crate::process::ProcessHandle;
use crate::search::resolve_executable;
use crate::streams::ChildStreams;

/// Exit status of a child whose stream setup or `execve()` failed.
pub const EXEC_FAILURE_STATUS: u8 = 127;

const DUP2_FAILED: &[u8] = b"procrun: dup2() failure\n";
const EXECVE_FAILED: &[u8] = b"procrun: execve() failure\n";

/// Start `program` with `args` in the background.
///
/// Each of `stdin`, `stdout` and `stderr` is either a descriptor that the
/// child should use for that stream, or `None` for the null device. The
/// caller's descriptors are duplicated, never consumed or closed. A bare
/// program name is looked up on `PATH`; the child's `argv[0]` is the
/// basename of the program. The child runs in its own session and inherits
/// the caller's environment.
///
/// On success the returned handle can be polled, waited on and signalled.
/// Every descriptor opened for the attempt is closed before this returns,
/// whether or not the launch succeeded.
///
/// The caller is expected to reap the child, either through the handle or
/// through a process-wide SIGCHLD disposition established at startup.
pub fn launch<S: AsRef<OsStr>>(
    stdin: Option<BorrowedFd<'_>>,
    stdout: Option<BorrowedFd<'_>>,
    stderr: Option<BorrowedFd<'_>>,
    program: impl AsRef<OsStr>,
    args: &[S],
) -> Result<ProcessHandle> {
    let program = program.as_ref();
    let argv = ArgumentVector::new(program, args)?;
    let path =
        resolve_executable(program).ok_or_else(|| ExecError::NotFound(program.to_owned()))?;
    let streams = ChildStreams::prepare(stdin, stdout, stderr)?;
    start(streams, &path, argv)
}

/// Fork and exec a child with already prepared streams and arguments.
///
/// Consumes `streams` and `argv`; both are released in the parent as soon
/// as the fork has happened, the child having its own copies.
pub(crate) fn start(
    streams: ChildStreams,
    path: &Path,
    argv: ArgumentVector,
) -> Result<ProcessHandle> {
    let path_cstring = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| ExecError::InvalidArgument(format!("NUL byte in {}", path.display())))?;
    // Everything the child touches is computed before the fork.
    let fds = streams.raw_fds();
    let envp = posix::current_environ();

    let pid = unsafe {
        match posix::fork().map_err(ExecError::Launch)? {
            Some(child_pid) => child_pid,
            None => exec_child(&fds, path_cstring.as_ptr(), argv.as_ptr(), envp),
        }
    };

    // The parent's copies of the child-end descriptors must be closed
    // promptly, otherwise a pipe given as stdout would never report EOF.
    drop(argv);
    drop(streams);

    debug!(pid, program = %path.display(), "launched child process");
    Ok(ProcessHandle::new(pid))
}

/// Body of the forked child: install the streams, leave the caller's
/// session, and replace the process image.
///
/// Runs between fork and exec, so it may not allocate, lock, log, or touch
/// anything the parent owns.
fn exec_child(
    fds: &[RawFd; 3],
    path: *const libc::c_char,
    argv: *const *const libc::c_char,
    envp: *const *const libc::c_char,
) -> ! {
    if !ChildStreams::install(fds) {
        posix::write_diagnostic(DUP2_FAILED);
        posix::_exit(EXEC_FAILURE_STATUS);
    }
    posix::detach_session();
    posix::reset_signals();
    unsafe {
        posix::execve(path, argv, envp);
    }
    posix::write_diagnostic(EXECVE_FAILED);
    posix::_exit(EXEC_FAILURE_STATUS)
}
