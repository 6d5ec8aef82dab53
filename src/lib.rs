//! Launch external programs and capture their output.
//!
//! The crate covers two layers:
//!
//! * [`launch`] starts a program in the background with each standard
//!   stream either duplicated from a caller-supplied descriptor or connected
//!   to the null device. The returned [`ProcessHandle`] can be polled
//!   without blocking, waited on, and signalled.
//!
//! * [`capture_output`] and [`capture_output_with_input`] run a program to
//!   completion and return everything it wrote to standard output, draining
//!   the pipe as the program runs so that a chatty child never stalls on a
//!   full pipe. Input is staged through a temporary file rather than a
//!   second pipe.
//!
//! The [`Exec`] builder offers the same operations with extra knobs, such
//! as a capture deadline and access to the child's exit status.
//!
//! # Examples
//!
//! ```no_run
//! let out = procrun::capture_output("echo", &["hello"])?;
//! assert_eq!(out.as_bytes(), b"hello\n");
//!
//! let sorted = procrun::capture_output_with_input("b\na\n", "sort", &[] as &[&str])?;
//! assert_eq!(sorted.as_bytes(), b"a\nb\n");
//! # Ok::<(), procrun::ExecError>(())
//! ```
//!
//! Only Unix is supported. Children are placed in their own session, so
//! terminal signals aimed at the caller do not reach them.

#![warn(missing_debug_implementations, rust_2018_idioms)]

#[cfg(not(unix))]
compile_error!("procrun supports Unix-like systems only");

mod argv;
mod capture;
mod error;
mod exec;
mod launch;
mod posix;
mod process;
mod search;
mod streams;
mod temp;

#[cfg(test)]
mod tests;

pub use argv::ArgumentVector;
pub use capture::{
    Capture, CaptureBuffer, CaptureConfig, capture_output, capture_output_with_input,
};
pub use error::{ExecError, Result};
pub use exec::Exec;
pub use launch::{EXEC_FAILURE_STATUS, launch};
pub use process::{ExitStatus, ProcessHandle, ProcessState};
pub use search::{path_is_reachable, resolve_executable, resolve_executable_in};
pub use streams::ChildStreams;
pub use temp::create_unique_temp_file;
