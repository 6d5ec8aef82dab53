use std::env;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// True if something exists at `path`, following symlinks.
pub fn path_is_reachable(path: impl AsRef<Path>) -> bool {
    fs::metadata(path).is_ok()
}

fn is_executable_file(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Locate `name` the way a shell would.
///
/// A name containing `/` is taken as a path and returned if it is
/// reachable. A bare name is looked up in each directory of `PATH` in order,
/// an empty entry standing for the current directory, and the first
/// executable regular file wins.
pub fn resolve_executable(name: impl AsRef<OsStr>) -> Option<PathBuf> {
    let name = name.as_ref();
    if name.is_empty() {
        return None;
    }
    if name.as_bytes().contains(&b'/') {
        let path = Path::new(name);
        return path_is_reachable(path).then(|| path.to_owned());
    }
    let path_var = env::var_os("PATH")?;
    search_dirs(name, &path_var)
}

fn search_dirs(name: &OsStr, path_var: &OsStr) -> Option<PathBuf> {
    env::split_paths(path_var)
        .map(|dir| {
            if dir.as_os_str().is_empty() {
                PathBuf::from(".").join(name)
            } else {
                dir.join(name)
            }
        })
        .find(|candidate| is_executable_file(candidate))
}

/// Like [`resolve_executable`], but searching the given `PATH`-style value
/// instead of the process environment.
pub fn resolve_executable_in(
    name: impl AsRef<OsStr>,
    path_var: impl AsRef<OsStr>,
) -> Option<PathBuf> {
    let name = name.as_ref();
    if name.is_empty() || name.as_bytes().contains(&b'/') {
        return None;
    }
    search_dirs(name, path_var.as_ref())
}
