use std::cmp::{max, min};
use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::ops::Deref;
use std::os::unix::io::{AsFd, BorrowedFd};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{ExecError, Result};
use crate::launch::launch;
use crate::posix;
use crate::process::{ExitStatus, ProcessHandle, ProcessState};
use crate::temp::create_unique_temp_file;

// Upper bound on waiting for a killed child to be reaped.
const REAP_LIMIT: Duration = Duration::from_secs(1);

/// Tuning of the capture loop.
///
/// The defaults suit ordinary command-line tools; most callers never need
/// to change them.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capacity the capture buffer starts with.
    pub initial_capacity: usize,
    /// How much the buffer grows by when headroom runs low.
    pub growth_increment: usize,
    /// Largest number of bytes requested from the pipe per read.
    pub read_chunk: usize,
    /// Headroom below which the buffer is grown before the next read.
    pub low_water: usize,
    /// Interval between child state polls, and the longest wait for data
    /// when the pipe is empty.
    pub poll_interval: Duration,
    /// Delay after the child is seen to exit, letting in-flight data land in
    /// the pipe before EOF is trusted.
    pub exit_grace: Duration,
    /// Delay after the final SIGKILL.
    pub kill_grace: Duration,
    /// Give up and kill the child if the capture takes longer than this.
    ///
    /// `None` waits as long as the child keeps its output open.
    pub timeout: Option<Duration>,
}

impl Default for CaptureConfig {
    fn default() -> CaptureConfig {
        CaptureConfig {
            initial_capacity: 64 * 1024,
            growth_increment: 32 * 1024,
            read_chunk: 4096,
            low_water: 512,
            poll_interval: Duration::from_micros(500),
            exit_grace: Duration::from_millis(5),
            kill_grace: Duration::from_millis(5),
            timeout: None,
        }
    }
}

impl CaptureConfig {
    /// Returns the config with `timeout` set.
    pub fn with_timeout(mut self, timeout: Duration) -> CaptureConfig {
        self.timeout = Some(timeout);
        self
    }
}

/// Output captured from a child.
///
/// The content is always followed by a NUL byte that is not part of it, so
/// the buffer can be handed to code expecting a C string.
#[derive(Clone, PartialEq, Eq)]
pub struct CaptureBuffer {
    // content followed by exactly one trailing NUL
    data: Vec<u8>,
}

impl CaptureBuffer {
    /// Create an empty buffer with room for `capacity` bytes, terminator
    /// included.
    pub fn with_capacity(capacity: usize) -> Result<CaptureBuffer> {
        let mut data = Vec::new();
        data.try_reserve_exact(max(capacity, 1))
            .map_err(|_| ExecError::BufferGrowth)?;
        data.push(0);
        Ok(CaptureBuffer { data })
    }

    /// Length of the content, not counting the terminator.
    pub fn len(&self) -> usize {
        self.data.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes that can be appended without reallocating.
    pub fn headroom(&self) -> usize {
        self.data.capacity() - self.data.len()
    }

    /// Grow the allocation by `increment` bytes.
    pub fn grow(&mut self, increment: usize) -> Result<()> {
        self.data
            .try_reserve_exact(self.headroom() + increment)
            .map_err(|_| ExecError::BufferGrowth)
    }

    /// Append `bytes`, keeping the terminator at the end.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.pop();
        self.data.extend_from_slice(bytes);
        self.data.push(0);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// The content including the trailing NUL.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.data
    }

    /// The content as a string, converted with `String::from_utf8_lossy`.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    /// Take the content, dropping the terminator.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.pop();
        self.data
    }
}

impl Deref for CaptureBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for CaptureBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for CaptureBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CaptureBuffer")
            .field(&String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

/// Output and, when known, exit status of a captured run.
#[derive(Debug)]
pub struct Capture {
    /// Everything the child wrote to its standard output.
    pub stdout: CaptureBuffer,
    /// Exit status, if the child was seen to exit before it was killed.
    ///
    /// The child is always sent SIGKILL when the capture ends, so `None`
    /// means its true status could not be observed.
    pub exit_status: Option<ExitStatus>,
}

impl Capture {
    /// Returns the standard output as string, converted from bytes using
    /// `String::from_utf8_lossy`.
    pub fn stdout_str(&self) -> String {
        self.stdout.to_string_lossy()
    }

    /// True if the child was seen to exit with code 0.
    pub fn success(&self) -> bool {
        self.exit_status.is_some_and(|s| s.success())
    }
}

/// Run `program` to completion and return everything it wrote to stdout.
///
/// Stdin and stderr are connected to the null device. The child's exit
/// status is ignored; use [`Exec::capture`](crate::Exec::capture) to get it.
pub fn capture_output<S: AsRef<OsStr>>(
    program: impl AsRef<OsStr>,
    args: &[S],
) -> Result<CaptureBuffer> {
    run_capture(None, None, program.as_ref(), args, &CaptureConfig::default())
        .map(|c| c.stdout)
}

/// Like [`capture_output`], but feed `input` to the child's stdin.
///
/// The input is staged in a temporary file rather than a second pipe, so a
/// child that writes before it has read all of its input cannot deadlock
/// against the capture loop. The file is removed before returning.
pub fn capture_output_with_input<S: AsRef<OsStr>>(
    input: impl AsRef<[u8]>,
    program: impl AsRef<OsStr>,
    args: &[S],
) -> Result<CaptureBuffer> {
    run_capture_with_input(
        input.as_ref(),
        None,
        program.as_ref(),
        args,
        &CaptureConfig::default(),
    )
    .map(|c| c.stdout)
}

/// Write `input` to a fresh temp file and rewind it for reading. Empty input
/// needs no file; the child then reads from the null device.
fn stage_input(input: &[u8]) -> Result<Option<NamedTempFile>> {
    if input.is_empty() {
        return Ok(None);
    }
    let mut file = create_unique_temp_file("tmp").map_err(ExecError::TempFile)?;
    file.write_all(input).map_err(ExecError::TempFile)?;
    file.seek(SeekFrom::Start(0)).map_err(ExecError::TempFile)?;
    Ok(Some(file))
}

pub(crate) fn run_capture_with_input<S: AsRef<OsStr>>(
    input: &[u8],
    stderr: Option<BorrowedFd<'_>>,
    program: &OsStr,
    args: &[S],
    config: &CaptureConfig,
) -> Result<Capture> {
    // Dropping the staged file, on any path, removes it.
    let staged = stage_input(input)?;
    let stdin = staged.as_ref().map(|f| f.as_file().as_fd());
    run_capture(stdin, stderr, program, args, config)
}

pub(crate) fn run_capture<S: AsRef<OsStr>>(
    stdin: Option<BorrowedFd<'_>>,
    stderr: Option<BorrowedFd<'_>>,
    program: &OsStr,
    args: &[S],
    config: &CaptureConfig,
) -> Result<Capture> {
    let mut buffer = CaptureBuffer::with_capacity(config.initial_capacity)?;
    let (read_end, write_end) = posix::pipe().map_err(ExecError::Pipe)?;
    let mut process = launch(stdin, Some(write_end.as_fd()), stderr, program, args)?;
    // Only the child may hold the write end now, so EOF on the read end
    // means the child is done with it.
    drop(write_end);

    let outcome = pump(&mut process, &read_end, &mut buffer, config);
    finish(&mut process, config);
    drop(read_end);

    let exit_status = outcome?;
    Ok(Capture {
        stdout: buffer,
        exit_status,
    })
}

/// Drain `pipe` into `buffer` until the child has exited and the pipe has
/// reported EOF. Returns the exit status if it was observed.
fn pump(
    process: &mut ProcessHandle,
    pipe: &File,
    buffer: &mut CaptureBuffer,
    config: &CaptureConfig,
) -> Result<Option<ExitStatus>> {
    posix::set_nonblocking(pipe).map_err(ExecError::Capture)?;

    // A zero-sized read would look like EOF, so headroom must stay positive.
    let low_water = max(config.low_water, 1);
    let growth = max(config.growth_increment, low_water);
    let mut chunk = vec![0u8; max(config.read_chunk, 1)];
    // A timeout past the representable range of Instant means no deadline.
    let deadline = config.timeout.and_then(|t| Instant::now().checked_add(t));

    let mut reader = pipe;
    let mut exited = false;
    let mut exit_status = None;
    let mut last_poll: Option<Instant> = None;

    loop {
        if buffer.headroom() < low_water {
            buffer.grow(growth)?;
        }
        let want = min(chunk.len(), buffer.headroom());
        match reader.read(&mut chunk[..want]) {
            Ok(0) if exited => break,
            // The child closed its stdout but has not been seen to exit.
            Ok(0) => thread::sleep(config.poll_interval),
            Ok(n) => buffer.append(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                let mut fds = [posix::PollFd::new(pipe, posix::POLLIN)];
                posix::poll(&mut fds, config.poll_interval).map_err(ExecError::Capture)?;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(pid = process.pid(), error = %e, "reading child output failed");
                return Err(ExecError::Capture(e));
            }
        }

        if !exited && last_poll.is_none_or(|t| t.elapsed() >= config.poll_interval) {
            last_poll = Some(Instant::now());
            match process.poll_state() {
                Ok(ProcessState::Running) => {}
                Ok(ProcessState::Exited(status)) => {
                    debug!(pid = process.pid(), %status, "child exited");
                    exited = true;
                    exit_status = Some(status);
                    thread::sleep(config.exit_grace);
                }
                Err(e) => {
                    // Reaped elsewhere; only EOF is left to wait for.
                    debug!(pid = process.pid(), error = %e, "cannot query child state");
                    exited = true;
                    thread::sleep(config.exit_grace);
                }
            }
        }

        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            debug!(pid = process.pid(), "capture deadline expired");
            return Err(ExecError::TimedOut);
        }
    }
    Ok(exit_status)
}

/// Kill the child unconditionally and reap it.
fn finish(process: &mut ProcessHandle, config: &CaptureConfig) {
    if process.exit_status().is_none() {
        debug!(pid = process.pid(), "killing child");
    }
    if let Err(e) = process.kill() {
        debug!(pid = process.pid(), error = %e, "kill failed");
    }
    thread::sleep(config.kill_grace);
    match process.wait_timeout(REAP_LIMIT) {
        Ok(Some(_)) => {}
        Ok(None) => warn!(pid = process.pid(), "killed child was not reaped"),
        Err(e) if e.raw_os_error() == Some(posix::ECHILD) => {}
        Err(e) => warn!(pid = process.pid(), error = %e, "reaping child failed"),
    }
}

impl From<CaptureBuffer> for Vec<u8> {
    fn from(buffer: CaptureBuffer) -> Vec<u8> {
        buffer.into_vec()
    }
}
