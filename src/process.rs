use std::cmp::min;
use std::fmt;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crate::posix;

/// Exit status of a process.
///
/// This wraps the raw status reported by `waitpid()`. Use the provided
/// methods to query it.
#[derive(Eq, PartialEq, Hash, Copy, Clone)]
pub struct ExitStatus(i32);

impl ExitStatus {
    pub(crate) fn from_raw(raw: i32) -> ExitStatus {
        ExitStatus(raw)
    }

    /// Returns the exit code if the process exited voluntarily, i.e. was not
    /// killed by a signal.
    pub fn code(&self) -> Option<u32> {
        libc::WIFEXITED(self.0).then(|| libc::WEXITSTATUS(self.0) as u32)
    }

    /// Returns the signal number if the process was killed by a signal.
    pub fn signal(&self) -> Option<i32> {
        libc::WIFSIGNALED(self.0).then(|| libc::WTERMSIG(self.0))
    }

    /// True if the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code() == Some(0)
    }

    /// True if the process was killed by the signal `signum`.
    pub fn is_killed_by(&self, signum: i32) -> bool {
        self.signal() == Some(signum)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            raw if libc::WIFEXITED(raw) => {
                write!(f, "exit code {}", libc::WEXITSTATUS(raw))
            }
            raw if libc::WIFSIGNALED(raw) => {
                write!(f, "signal {}", libc::WTERMSIG(raw))
            }
            raw => write!(f, "unrecognized wait status: {} {:#x}", raw, raw),
        }
    }
}

impl fmt::Debug for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            raw if libc::WIFEXITED(raw) => {
                write!(f, "ExitStatus(Exited({}))", libc::WEXITSTATUS(raw))
            }
            raw if libc::WIFSIGNALED(raw) => {
                write!(f, "ExitStatus(Signal({}))", libc::WTERMSIG(raw))
            }
            raw => write!(f, "ExitStatus(Unknown({} {:#x}))", raw, raw),
        }
    }
}

/// Result of a non-blocking state query.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProcessState {
    /// The process has not exited yet.
    Running,
    /// The process has exited and has been reaped.
    Exited(ExitStatus),
}

#[derive(Debug, Copy, Clone)]
enum Lifecycle {
    Running,
    Reaped(ExitStatus),
    // Someone else reaped the child, e.g. because SIGCHLD is ignored. The
    // PID may already belong to an unrelated process.
    Lost,
}

/// Handle to a child process started by [`launch`](crate::launch).
///
/// The handle owns the right to reap the child. Once the child has been
/// reaped its PID may be recycled by the OS, so the handle remembers that and
/// never signals it again.
///
/// Dropping a handle whose child is still running makes one non-blocking
/// attempt to reap it and otherwise abandons it; callers that need the child
/// gone should [`kill`](Self::kill) and [`wait`](Self::wait) first.
pub struct ProcessHandle {
    pid: u32,
    state: Lifecycle,
}

impl ProcessHandle {
    pub(crate) fn new(pid: u32) -> ProcessHandle {
        ProcessHandle {
            pid,
            state: Lifecycle::Running,
        }
    }

    /// Returns the PID of the child.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns the exit status if the child is known to have been reaped.
    ///
    /// This does not perform any system calls.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match self.state {
            Lifecycle::Reaped(status) => Some(status),
            _ => None,
        }
    }

    /// Check whether the child has exited, without blocking.
    ///
    /// An exited child is reaped and its status cached, so later calls keep
    /// returning the same `Exited` value. Fails if the PID is not a child of
    /// this process or was reaped by someone else.
    pub fn poll_state(&mut self) -> io::Result<ProcessState> {
        self.waitpid(false)?;
        Ok(match self.state {
            Lifecycle::Reaped(status) => ProcessState::Exited(status),
            _ => ProcessState::Running,
        })
    }

    /// Wait for the child to exit and return its exit status.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        loop {
            match self.waitpid(true) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
            if let Lifecycle::Reaped(status) = self.state {
                return Ok(status);
            }
        }
    }

    /// Wait for the child to exit, giving up after `dur`.
    ///
    /// Returns `Ok(None)` if the timeout elapsed first. A `dur` too large to
    /// be represented as a point in time waits without a limit.
    pub fn wait_timeout(&mut self, dur: Duration) -> io::Result<Option<ExitStatus>> {
        let Some(deadline) = Instant::now().checked_add(dur) else {
            return self.wait().map(Some);
        };
        let mut delay = Duration::from_millis(1);
        loop {
            if let ProcessState::Exited(status) = self.poll_state()? {
                return Ok(Some(status));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(min(delay, deadline - now));
            delay = min(delay * 2, Duration::from_millis(100));
        }
    }

    /// Send `signal` to the child.
    ///
    /// Does nothing if the child is known to have been reaped.
    pub fn send_signal(&self, signal: i32) -> io::Result<()> {
        match self.state {
            Lifecycle::Running => posix::kill(self.pid, signal),
            Lifecycle::Reaped(_) | Lifecycle::Lost => Ok(()),
        }
    }

    /// Terminate the child with SIGTERM.
    pub fn terminate(&self) -> io::Result<()> {
        self.send_signal(posix::SIGTERM)
    }

    /// Kill the child with SIGKILL.
    pub fn kill(&self) -> io::Result<()> {
        self.send_signal(posix::SIGKILL)
    }

    fn waitpid(&mut self, block: bool) -> io::Result<()> {
        match self.state {
            Lifecycle::Reaped(_) => return Ok(()),
            Lifecycle::Lost => return Err(io::Error::from_raw_os_error(posix::ECHILD)),
            Lifecycle::Running => {}
        }
        let flags = if block { 0 } else { posix::WNOHANG };
        match posix::waitpid(self.pid, flags) {
            // With WNOHANG a zero PID means the child is still running.
            Ok((pid_out, raw)) if pid_out == self.pid => {
                if libc::WIFEXITED(raw) || libc::WIFSIGNALED(raw) {
                    self.state = Lifecycle::Reaped(ExitStatus::from_raw(raw));
                }
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) if e.raw_os_error() == Some(posix::ECHILD) => {
                self.state = Lifecycle::Lost;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // attempt to reap the child process to avoid leaving a zombie
        if let Lifecycle::Running = self.state {
            posix::waitpid(self.pid, posix::WNOHANG).ok();
        }
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("state", &self.state)
            .finish()
    }
}
