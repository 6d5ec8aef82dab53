use std::fs;
use std::os::unix::fs::PermissionsExt;

use tempfile::TempDir;

use crate::{create_unique_temp_file, path_is_reachable, resolve_executable, resolve_executable_in};

#[test]
fn resolve_on_path() {
    let sh = resolve_executable("sh").unwrap();
    assert!(sh.ends_with("sh"));
    assert!(path_is_reachable(&sh));
}

#[test]
fn resolve_explicit_path() {
    assert_eq!(
        resolve_executable("/bin/sh").unwrap().to_str(),
        Some("/bin/sh")
    );
    assert!(resolve_executable("/nonexistent/sh").is_none());
}

#[test]
fn resolve_missing() {
    assert!(resolve_executable("nosuchcommand").is_none());
    assert!(resolve_executable("").is_none());
}

#[test]
fn resolve_in_custom_path() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    // not executable in the first directory, executable in the second
    fs::write(first.path().join("tool"), b"#!/bin/sh\n").unwrap();
    let tool = second.path().join("tool");
    fs::write(&tool, b"#!/bin/sh\n").unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
    // a directory with the right name is skipped too
    fs::create_dir(first.path().join("other")).unwrap();

    let path_var = std::env::join_paths([first.path(), second.path()]).unwrap();
    assert_eq!(resolve_executable_in("tool", &path_var), Some(tool));
    assert_eq!(resolve_executable_in("other", &path_var), None);
    assert_eq!(resolve_executable_in("./tool", &path_var), None);
}

#[test]
fn temp_file_is_unique_and_removed() {
    let a = create_unique_temp_file("tmp").unwrap();
    let b = create_unique_temp_file(".tmp").unwrap();
    assert_ne!(a.path(), b.path());
    for f in [&a, &b] {
        let name = f.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("procrun"));
        assert!(name.ends_with(".tmp"));
        assert!(!name.ends_with("..tmp"));
    }
    let path = a.path().to_owned();
    assert!(path_is_reachable(&path));
    drop(a);
    assert!(!path_is_reachable(&path));
}
