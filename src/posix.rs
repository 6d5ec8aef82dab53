use std::ffi::CStr;
use std::fs::File;
use std::io::{Error, Result};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::ptr;
use std::time::Duration;

pub use libc::{ECHILD, SIGHUP, SIGKILL, SIGTERM};

pub const NULL_DEVICE: &CStr = c"/dev/null";

fn check_err<T: Ord + Default>(num: T) -> Result<T> {
    if num < T::default() {
        return Err(Error::last_os_error());
    }
    Ok(num)
}

/// Create a pipe with both ends marked close-on-exec.
pub fn pipe() -> Result<(File, File)> {
    let mut fds = [0 as libc::c_int; 2];
    check_err(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) })?;
    Ok(unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) })
}

/// Duplicate `fd` onto a fresh close-on-exec descriptor numbered above the
/// standard streams.
pub fn dup_cloexec(fd: RawFd) -> Result<File> {
    let new_fd = check_err(unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 3) })?;
    Ok(unsafe { File::from_raw_fd(new_fd) })
}

/// Open the null device for reading or writing.
pub fn open_null(for_read: bool) -> Result<File> {
    let mode = if for_read {
        libc::O_RDONLY
    } else {
        libc::O_WRONLY
    };
    let fd = check_err(unsafe { libc::open(NULL_DEVICE.as_ptr(), mode | libc::O_CLOEXEC) })?;
    let file = unsafe { File::from_raw_fd(fd) };
    if fd > 2 {
        return Ok(file);
    }
    // One of the standard slots was closed in the parent and open() reused it.
    // Move the descriptor out of the way so that installing it in the child
    // is never a no-op dup2().
    dup_cloexec(file.as_raw_fd())
}

pub fn set_nonblocking(f: &File) -> Result<()> {
    let fd = f.as_raw_fd();
    let old = check_err(unsafe { libc::fcntl(fd, libc::F_GETFL) })?;
    check_err(unsafe { libc::fcntl(fd, libc::F_SETFL, old | libc::O_NONBLOCK) })?;
    Ok(())
}

/// Fork the current process.
///
/// Returns `Some(pid)` in the parent and `None` in the child.
///
/// # Safety
///
/// The child may only call async-signal-safe functions until it execs or
/// exits. Everything it needs must be prepared before the fork.
pub unsafe fn fork() -> Result<Option<u32>> {
    let pid = check_err(unsafe { libc::fork() })?;
    if pid == 0 {
        Ok(None)
    } else {
        Ok(Some(pid as u32))
    }
}

pub fn _exit(status: u8) -> ! {
    unsafe { libc::_exit(status as libc::c_int) }
}

pub const WNOHANG: i32 = libc::WNOHANG;

pub fn waitpid(pid: u32, flags: i32) -> Result<(u32, i32)> {
    let mut status = 0 as libc::c_int;
    let pid = check_err(unsafe {
        libc::waitpid(
            pid as libc::pid_t,
            &mut status as *mut libc::c_int,
            flags as libc::c_int,
        )
    })?;
    Ok((pid as u32, status))
}

pub fn kill(pid: u32, signal: i32) -> Result<()> {
    check_err(unsafe { libc::kill(pid as libc::pid_t, signal) })?;
    Ok(())
}

#[repr(C)]
pub struct PollFd(libc::pollfd);

impl PollFd {
    pub fn new(f: &File, events: i16) -> PollFd {
        PollFd(libc::pollfd {
            fd: f.as_raw_fd(),
            events,
            revents: 0,
        })
    }
}

pub use libc::POLLIN;

/// Wait until one of `fds` is ready or `timeout` elapses. An interrupted
/// wait counts as a timeout.
pub fn poll(fds: &mut [PollFd], timeout: Duration) -> Result<usize> {
    let timeout = timeout.as_millis().clamp(1, i32::MAX as u128) as libc::c_int;
    let fds_ptr = fds.as_mut_ptr() as *mut libc::pollfd;
    match check_err(unsafe { libc::poll(fds_ptr, fds.len() as libc::nfds_t, timeout) }) {
        Ok(cnt) => Ok(cnt as usize),
        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(0),
        Err(e) => Err(e),
    }
}

// The functions below run in the forked child before exec. They must stay
// async-signal-safe: raw syscalls only, no allocation, no locks, and errors
// reported as bare booleans because building an io::Error is not allowed
// to touch the heap.

/// Make `fd` available as standard stream `target`, with close-on-exec
/// cleared so that it survives the exec.
pub fn install_stream(fd: RawFd, target: RawFd) -> bool {
    unsafe {
        if fd == target {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            flags >= 0 && libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) >= 0
        } else {
            libc::dup2(fd, target) >= 0
        }
    }
}

/// Detach from the controlling terminal's session, ignoring the SIGHUP that
/// the session change might deliver.
pub fn detach_session() {
    unsafe {
        libc::signal(SIGHUP, libc::SIG_IGN);
        libc::setsid();
        libc::signal(SIGHUP, libc::SIG_DFL);
    }
}

/// Reset signal handling to the defaults that Unix programs expect.
///
/// libstd ignores SIGPIPE, and signal-handling libraries often set a mask.
/// Children inherit both, but most programs never reset them, so clean up
/// before running the target.
pub fn reset_signals() {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigprocmask(libc::SIG_SETMASK, &set, ptr::null_mut());
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

/// Write a fixed diagnostic straight to fd 2, bypassing any buffering.
pub fn write_diagnostic(msg: &[u8]) {
    unsafe {
        libc::write(2, msg.as_ptr() as *const libc::c_void, msg.len());
    }
}

unsafe extern "C" {
    static environ: *const *const libc::c_char;
}

/// The environment block the current process would pass to a child.
pub fn current_environ() -> *const *const libc::c_char {
    unsafe { environ }
}

/// Replace the process image. Only returns on failure.
///
/// # Safety
///
/// `path` must be NUL-terminated and `argv`/`envp` must be null-terminated
/// arrays of pointers to NUL-terminated strings that outlive the call.
pub unsafe fn execve(
    path: *const libc::c_char,
    argv: *const *const libc::c_char,
    envp: *const *const libc::c_char,
) {
    unsafe {
        libc::execve(path, argv, envp);
    }
}
