use std::ffi::{CStr, OsStr};
use std::mem;

use crate::{ArgumentVector, ExecError};

#[test]
fn program_basename_is_first() {
    let argv = ArgumentVector::new(OsStr::new("/usr/bin/printf"), &["%s", "foo"]).unwrap();
    assert_eq!(argv.len(), 3);
    let args: Vec<_> = argv.iter().collect();
    assert_eq!(args, ["printf", "%s", "foo"]);
}

#[test]
fn bare_program_name_kept() {
    let argv = ArgumentVector::new(OsStr::new("true"), &[] as &[&str]).unwrap();
    assert_eq!(argv.len(), 1);
    assert_eq!(argv.iter().collect::<Vec<_>>(), ["true"]);
}

#[test]
fn pointer_table_is_null_terminated() {
    let argv = ArgumentVector::new(OsStr::new("/bin/echo"), &["a", "", "b c"]).unwrap();
    let table = argv.as_ptr();
    let strings: Vec<_> = (0..argv.len())
        .map(|i| unsafe { CStr::from_ptr(*table.add(i)) }.to_bytes().to_vec())
        .collect();
    assert_eq!(strings, [&b"echo"[..], b"a", b"", b"b c"]);
    assert!(unsafe { *table.add(argv.len()) }.is_null());
}

#[test]
fn consecutive_empty_arguments() {
    let argv = ArgumentVector::new(OsStr::new("printf"), &["", "", "x", ""]).unwrap();
    assert_eq!(argv.len(), 5);
    let table = argv.as_ptr();
    let strings: Vec<_> = (0..argv.len())
        .map(|i| unsafe { CStr::from_ptr(*table.add(i)) }.to_bytes().to_vec())
        .collect();
    assert_eq!(strings, [&b"printf"[..], b"", b"", b"x", b""]);
    assert!(unsafe { *table.add(argv.len()) }.is_null());
    assert_eq!(argv.iter().collect::<Vec<_>>(), ["printf", "", "", "x", ""]);
}

#[test]
fn nul_in_argument_rejected() {
    let result = ArgumentVector::new(OsStr::new("echo"), &["foo\0bar"]);
    assert!(matches!(result, Err(ExecError::InvalidArgument(_))));
}

#[test]
fn nul_in_program_rejected() {
    let result = ArgumentVector::new(OsStr::new("echo\0foo"), &[] as &[&str]);
    assert!(matches!(result, Err(ExecError::InvalidArgument(_))));
}

#[test]
fn required_bytes_counts_strings_and_pointers() {
    let ptr = mem::size_of::<*const u8>();
    let needed = ArgumentVector::required_bytes(OsStr::new("/bin/ls"), &["-l", "/tmp"]);
    // "ls\0" + "-l\0" + "/tmp\0" and four pointer slots
    assert_eq!(needed, 3 + 3 + 5 + 4 * ptr);

    // empty arguments still take a NUL and a pointer each
    let needed = ArgumentVector::required_bytes(OsStr::new("true"), &["", ""]);
    assert_eq!(needed, 5 + 1 + 1 + 4 * ptr);
}

#[test]
fn debug_lists_arguments() {
    let argv = ArgumentVector::new(OsStr::new("/bin/sh"), &["-c", "true"]).unwrap();
    assert_eq!(format!("{:?}", argv), r#"["sh", "-c", "true"]"#);
}
