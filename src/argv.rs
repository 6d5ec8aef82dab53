use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::ptr;

use crate::error::{ExecError, Result};

/// A prepared, null-terminated argument vector for `execve`.
///
/// All strings live back to back in a single byte block, each followed by a
/// NUL, and a separate table holds one pointer per string plus the trailing
/// null pointer. Both are sized in one pass and allocated once up front, so
/// nothing is allocated after the fork and the child can hand the table to
/// `execve` as is.
///
/// Element 0 is the basename of the program path, not the full path.
pub struct ArgumentVector {
    // Pointed to by `ptrs`; never resized after construction.
    block: Vec<u8>,
    ptrs: Vec<*const libc::c_char>,
}

fn basename(program: &OsStr) -> &[u8] {
    let bytes = program.as_bytes();
    match bytes.iter().rposition(|&b| b == b'/') {
        Some(pos) => &bytes[pos + 1..],
        None => bytes,
    }
}

fn check_no_nul(bytes: &[u8]) -> Result<()> {
    if bytes.contains(&0) {
        return Err(ExecError::InvalidArgument(format!(
            "NUL byte in {:?}",
            String::from_utf8_lossy(bytes)
        )));
    }
    Ok(())
}

fn out_of_memory() -> ExecError {
    ExecError::Setup(io::ErrorKind::OutOfMemory.into())
}

/// Sizes of the two allocations: bytes of the string block, and pointer
/// slots in the table (one per string plus the terminator).
fn layout<S: AsRef<OsStr>>(program: &OsStr, args: &[S]) -> (usize, usize) {
    let strings: usize = args.iter().map(|a| a.as_ref().len() + 1).sum();
    (basename(program).len() + 1 + strings, args.len() + 2)
}

// Never empty: the program name is always element 0.
#[allow(clippy::len_without_is_empty)]
impl ArgumentVector {
    /// Build the vector for `program` followed by `args`.
    pub fn new<S: AsRef<OsStr>>(program: &OsStr, args: &[S]) -> Result<ArgumentVector> {
        check_no_nul(program.as_bytes())?;
        for arg in args {
            check_no_nul(arg.as_ref().as_bytes())?;
        }
        let (string_bytes, slots) = layout(program, args);

        let mut block = Vec::new();
        block
            .try_reserve_exact(string_bytes)
            .map_err(|_| out_of_memory())?;
        let mut ptrs = Vec::new();
        ptrs.try_reserve_exact(slots)
            .map_err(|_| out_of_memory())?;

        block.extend_from_slice(basename(program));
        block.push(0);
        for arg in args {
            block.extend_from_slice(arg.as_ref().as_bytes());
            block.push(0);
        }
        debug_assert_eq!(block.len(), string_bytes);

        // The block is complete and will not move again. Every string starts
        // at offset 0 or right after a NUL; the final NUL starts nothing.
        let base = block.as_ptr() as *const libc::c_char;
        ptrs.push(base);
        for (i, _) in block[..string_bytes - 1]
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b == 0)
        {
            ptrs.push(unsafe { base.add(i + 1) });
        }
        ptrs.push(ptr::null());
        debug_assert_eq!(ptrs.len(), slots);

        Ok(ArgumentVector { block, ptrs })
    }

    /// Bytes needed for a vector of `program` and `args`: every string with
    /// its NUL, plus one pointer per argument and two more for the program
    /// name and the terminator. These are exactly the sizes [`new`](Self::new)
    /// reserves.
    pub fn required_bytes<S: AsRef<OsStr>>(program: &OsStr, args: &[S]) -> usize {
        let (string_bytes, slots) = layout(program, args);
        string_bytes + slots * mem::size_of::<*const libc::c_char>()
    }

    /// Number of arguments, including the program name.
    pub fn len(&self) -> usize {
        self.ptrs.len() - 1
    }

    /// Pointer to the null-terminated pointer table.
    pub fn as_ptr(&self) -> *const *const libc::c_char {
        self.ptrs.as_ptr()
    }

    /// The arguments as `OsStr` values, program name first.
    pub fn iter(&self) -> impl Iterator<Item = &OsStr> {
        self.block
            .split(|&b| b == 0)
            .take(self.len())
            .map(OsStr::from_bytes)
    }
}

impl fmt::Debug for ArgumentVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
