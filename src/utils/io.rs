//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents with standardized error handling.
///
/// Wraps `fs::read_to_string` with consistent `Error::internal_io` formatting.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write content to file with standardized error handling.
///
/// Wraps `fs::write` with consistent `Error::internal_io` formatting.
pub fn write_file(path: &Path, content: &str, operation: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write content to file atomically (write to .tmp, then rename).
///
/// The rename is atomic on POSIX filesystems, so readers always see either
/// the old content or the new content, never a partial write.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    let filename = path.file_name().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    let tmp_path = parent.join(format!("{}.tmp", filename.to_string_lossy()));

    fs::write(&tmp_path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("{} (write temp)", operation)))
    })?;

    fs::rename(&tmp_path, path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{} (rename)", operation))))?;

    Ok(())
}

/// Copy a directory tree, preserving relative structure.
///
/// Symlinks are followed (copied as their target's content), matching what
/// a zip round trip of the same tree would produce.
pub fn copy_dir_recursive(src: &Path, dst: &Path, operation: &str) -> Result<()> {
    fs::create_dir_all(dst)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))?;

    let entries = fs::read_dir(src)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))?;
        let target = dst.join(entry.file_name());
        let source = entry.path();

        if source.is_dir() {
            copy_dir_recursive(&source, &target, operation)?;
        } else {
            fs::copy(&source, &target)
                .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn read_file_succeeds_for_existing_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "test content").unwrap();

        let content = read_file(temp.path(), "test read").unwrap();
        assert!(content.contains("test content"));
    }

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let result = read_file(Path::new("/nonexistent/file.txt"), "test read");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn write_file_atomic_replaces_content() {
        let temp = NamedTempFile::new().unwrap();
        write_file_atomic(temp.path(), "first", "test write").unwrap();
        write_file_atomic(temp.path(), "second", "test write").unwrap();

        let content = fs::read_to_string(temp.path()).unwrap();
        assert_eq!(content, "second");
    }

    #[test]
    fn copy_dir_recursive_preserves_structure() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/file.txt"), "nested").unwrap();
        fs::write(src.path().join("top.txt"), "top").unwrap();

        let target = dst.path().join("copy");
        copy_dir_recursive(src.path(), &target, "test copy").unwrap();

        assert_eq!(
            fs::read_to_string(target.join("a/b/file.txt")).unwrap(),
            "nested"
        );
        assert_eq!(fs::read_to_string(target.join("top.txt")).unwrap(), "top");
    }
}
