//! Temporary file fixtures.

use std::io::Write;
use tempfile::NamedTempFile;

/// Write `contents` to a fresh temporary file with the given extension.
///
/// The file is deleted when the returned handle is dropped.
pub fn temp_file_with(contents: &str, extension: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(&format!(".{extension}"))
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp file");
    file.flush().expect("Failed to flush temp file");
    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_file_with() {
        let file = temp_file_with("name: smoke\n", "yaml");
        let path = file.path().to_path_buf();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("yaml"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "name: smoke\n");
    }
}
