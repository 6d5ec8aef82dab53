use std::ffi::{OsStr, OsString};
use std::fmt;
use std::os::unix::io::{AsFd, BorrowedFd};
use std::time::Duration;

use crate::capture::{Capture, CaptureBuffer, CaptureConfig, run_capture, run_capture_with_input};
use crate::error::Result;
use crate::launch::launch;
use crate::process::ProcessHandle;

/// A builder for launching a program or capturing its output.
///
/// `Exec` collects the program, its arguments and the descriptors to give
/// it, and then either starts it in the background with
/// [`launch`](Self::launch) or runs it to completion with one of the
/// `capture` methods:
///
/// ```no_run
/// use procrun::Exec;
///
/// let listing = Exec::cmd("ls").arg("-l").capture()?.stdout_str();
/// # Ok::<(), procrun::ExecError>(())
/// ```
///
/// Streams that are not set are connected to the null device. Descriptors
/// passed in are borrowed and duplicated, so the caller keeps ownership.
#[must_use]
pub struct Exec<'a> {
    command: OsString,
    args: Vec<OsString>,
    stdin: Option<BorrowedFd<'a>>,
    stdout: Option<BorrowedFd<'a>>,
    stderr: Option<BorrowedFd<'a>>,
    config: CaptureConfig,
}

impl<'a> Exec<'a> {
    /// Constructs a new `Exec`, configured to run `command`.
    ///
    /// A `command` without a `/` is looked up on `PATH` when the process is
    /// started.
    pub fn cmd(command: impl AsRef<OsStr>) -> Exec<'a> {
        Exec {
            command: command.as_ref().to_owned(),
            args: vec![],
            stdin: None,
            stdout: None,
            stderr: None,
            config: CaptureConfig::default(),
        }
    }

    /// Appends `arg` to argument list.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Exec<'a> {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Extends the argument list with `args`.
    pub fn args(mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Exec<'a> {
        self.args
            .extend(args.into_iter().map(|x| x.as_ref().to_owned()));
        self
    }

    /// Gives the child a duplicate of `fd` as its standard input.
    pub fn stdin(mut self, fd: &'a impl AsFd) -> Exec<'a> {
        self.stdin = Some(fd.as_fd());
        self
    }

    /// Gives the child a duplicate of `fd` as its standard output.
    ///
    /// Ignored by the `capture` methods, which connect stdout to a pipe.
    pub fn stdout(mut self, fd: &'a impl AsFd) -> Exec<'a> {
        self.stdout = Some(fd.as_fd());
        self
    }

    /// Gives the child a duplicate of `fd` as its standard error.
    pub fn stderr(mut self, fd: &'a impl AsFd) -> Exec<'a> {
        self.stderr = Some(fd.as_fd());
        self
    }

    /// Replaces the capture loop configuration.
    pub fn config(mut self, config: CaptureConfig) -> Exec<'a> {
        self.config = config;
        self
    }

    /// Limits how long the `capture` methods may run.
    ///
    /// When the limit is reached the child is killed and the capture fails
    /// with [`ExecError::TimedOut`](crate::ExecError::TimedOut).
    pub fn timeout(mut self, timeout: Duration) -> Exec<'a> {
        self.config.timeout = Some(timeout);
        self
    }

    /// Starts the process in the background and returns a handle to it.
    pub fn launch(&self) -> Result<ProcessHandle> {
        launch(self.stdin, self.stdout, self.stderr, &self.command, &self.args)
    }

    /// Runs the process to completion, capturing its standard output.
    pub fn capture(self) -> Result<Capture> {
        run_capture(
            self.stdin,
            self.stderr,
            &self.command,
            &self.args,
            &self.config,
        )
    }

    /// Runs the process to completion with `input` as its standard input,
    /// capturing its standard output.
    ///
    /// This overrides any descriptor set with [`stdin`](Self::stdin).
    pub fn capture_with_input(self, input: impl AsRef<[u8]>) -> Result<Capture> {
        run_capture_with_input(
            input.as_ref(),
            self.stderr,
            &self.command,
            &self.args,
            &self.config,
        )
    }

    /// Like [`capture`](Self::capture), but return only the output.
    pub fn capture_output(self) -> Result<CaptureBuffer> {
        self.capture().map(|c| c.stdout)
    }

    /// Show Exec as command-line string quoted in the Unix style.
    pub fn to_cmdline_lossy(&self) -> String {
        let mut out = String::new();
        for (i, arg) in std::iter::once(&self.command).chain(&self.args).enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&display_escape(&arg.to_string_lossy()));
        }
        out
    }
}

fn display_escape(s: &str) -> String {
    fn nice_char(c: char) -> bool {
        matches!(c, '-' | '_' | '.' | ',' | '/' | '=' | ':') || c.is_alphanumeric()
    }
    if !s.is_empty() && s.chars().all(nice_char) {
        return s.to_owned();
    }
    format!("'{}'", s.replace('\'', r#"'\''"#))
}

impl fmt::Debug for Exec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exec {{ {} }}", self.to_cmdline_lossy())
    }
}
