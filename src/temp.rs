use std::io;

use tempfile::NamedTempFile;

const TEMP_PREFIX: &str = "procrun";

/// Exclusively create a uniquely named file in the system temp directory.
///
/// `extension` is appended to the name, with a dot inserted if it does not
/// start with one. The file is removed when the returned handle is dropped.
pub fn create_unique_temp_file(extension: &str) -> io::Result<NamedTempFile> {
    let suffix = if extension.is_empty() || extension.starts_with('.') {
        extension.to_owned()
    } else {
        format!(".{extension}")
    };
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&suffix)
        .tempfile()
}
