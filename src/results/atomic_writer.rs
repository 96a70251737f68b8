//! Atomic file writes with automatic cleanup on failure.
//!
//! Content goes to a temporary file in the destination's directory, which
//! then replaces the destination in one rename. If the writer is dropped
//! before `finish()`, the temporary file is deleted.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::AppError;

/// Buffered writer that only becomes visible at its final path on `finish()`.
pub struct AtomicFileWriter {
    writer: BufWriter<NamedTempFile>,
    final_path: PathBuf,
}

impl AtomicFileWriter {
    /// # Errors
    ///
    /// Returns `AppError::Io` if the parent directory cannot be determined or
    /// the temporary file cannot be created there.
    pub fn new(final_path: impl AsRef<Path>) -> Result<Self, AppError> {
        let final_path = final_path.as_ref().to_path_buf();

        let parent_dir = match final_path.parent() {
            Some(p) if p.as_os_str().is_empty() => Path::new("."),
            Some(p) => p,
            None => {
                return Err(AppError::Io(format!(
                    "Cannot determine parent directory for: {}",
                    final_path.display()
                )))
            }
        };

        let temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|e| AppError::Io(format!("Failed to create temporary file: {}", e)))?;

        Ok(Self {
            writer: BufWriter::new(temp_file),
            final_path,
        })
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), AppError> {
        self.writer
            .write_all(bytes)
            .map_err(|e| AppError::Io(format!("Failed to write temporary file: {}", e)))
    }

    /// Flushes and moves the file into place. Returns the final path.
    pub fn finish(self) -> Result<PathBuf, AppError> {
        let named_temp = self
            .writer
            .into_inner()
            .map_err(|e| AppError::Io(format!("Failed to flush buffer: {}", e.error())))?;

        named_temp.persist(&self.final_path).map_err(|e| {
            AppError::Io(format!(
                "Failed to persist file to {}: {}",
                self.final_path.display(),
                e.error
            ))
        })?;

        Ok(self.final_path)
    }
}

/// Writes `contents` to `path` atomically.
pub fn write_atomic(path: impl AsRef<Path>, contents: &[u8]) -> Result<PathBuf, AppError> {
    let mut writer = AtomicFileWriter::new(path)?;
    writer.write_all(contents)?;
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_successful_write() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("merged.csv");

        let result_path = write_atomic(&final_path, b"\"Keyword\"\n\"k\"").unwrap();

        assert_eq!(result_path, final_path);
        assert_eq!(fs::read_to_string(&final_path).unwrap(), "\"Keyword\"\n\"k\"");
    }

    #[test]
    fn test_drop_cleanup() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("merged.csv");

        {
            let mut writer = AtomicFileWriter::new(&final_path).unwrap();
            writer.write_all(b"partial").unwrap();
            // Dropped without finish()
        }

        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert!(entries.is_empty(), "temp file should be cleaned up");
        assert!(!final_path.exists());
    }

    #[test]
    fn test_overwrite_behavior() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("merged.csv");
        fs::write(&final_path, "OLD_CONTENT").unwrap();

        write_atomic(&final_path, b"NEW").unwrap();

        assert_eq!(fs::read_to_string(&final_path).unwrap(), "NEW");
    }

    #[test]
    fn test_missing_directory_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("no_such_dir").join("merged.csv");

        let result = write_atomic(&final_path, b"x");
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_root_path_has_no_parent() {
        assert!(AtomicFileWriter::new("/").is_err());
    }
}
