//! File utilities for reading generated artifacts and fingerprinting them.
//!
//! Generated files are untrusted: they may be missing, truncated, binary, or
//! carry invalid UTF-8. Every failure here maps to an input error so the
//! batch runner can record it against the affected pairs and move on.

use std::fs;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::core::errors::{CodesimError, Result};

/// Artifacts larger than this are rejected as input errors.
pub const MAX_ARTIFACT_BYTES: u64 = 10 * 1024 * 1024;

/// Safe file reading with UTF-8 validation and fallback handling
pub struct FileReader;

impl FileReader {
    /// Read an artifact to a string, converting invalid UTF-8 lossily.
    pub fn read_to_string(file_path: &Path) -> Result<String> {
        let shown = file_path.display().to_string();

        let metadata =
            fs::metadata(file_path).map_err(|e| CodesimError::input_io(shown.clone(), e))?;
        if !metadata.is_file() {
            return Err(CodesimError::input(shown, "not a regular file"));
        }
        if metadata.len() > MAX_ARTIFACT_BYTES {
            return Err(CodesimError::input(
                shown,
                format!(
                    "file is {} bytes, above the {} byte limit",
                    metadata.len(),
                    MAX_ARTIFACT_BYTES
                ),
            ));
        }

        let mut bytes = Vec::with_capacity(metadata.len() as usize);
        fs::File::open(file_path)
            .and_then(|mut file| file.read_to_end(&mut bytes))
            .map_err(|e| CodesimError::input_io(shown.clone(), e))?;

        if Self::looks_binary(&bytes) {
            return Err(CodesimError::input(shown, "file appears to be binary"));
        }

        match String::from_utf8(bytes) {
            Ok(content) => Ok(content),
            Err(err) => {
                warn!(
                    "File contained invalid UTF-8, converted with lossy encoding: {}",
                    shown
                );
                Ok(String::from_utf8_lossy(err.as_bytes()).into_owned())
            }
        }
    }

    /// Sample the first KiB for NUL bytes (common indicator of binary content)
    fn looks_binary(bytes: &[u8]) -> bool {
        let sample = &bytes[..bytes.len().min(1024)];
        if sample.is_empty() {
            return false;
        }
        let null_bytes = sample.iter().filter(|&&b| b == 0).count();
        (null_bytes as f64 / sample.len() as f64) > 0.01
    }
}

/// SHA-256 hex digest of artifact content.
pub fn content_fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_valid_utf8_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "def add(a, b):\n    return a + b").unwrap();

        let content = FileReader::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("return a + b"));
    }

    #[test]
    fn test_read_invalid_utf8_is_lossy() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"x = '\xff\xfe'\n").unwrap();

        let content = FileReader::read_to_string(temp_file.path()).unwrap();
        assert!(content.starts_with("x = '"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let dir = tempdir().unwrap();
        let err = FileReader::read_to_string(&dir.path().join("absent.py")).unwrap_err();
        assert!(matches!(err, CodesimError::Input { .. }));
    }

    #[test]
    fn test_directory_is_input_error() {
        let dir = tempdir().unwrap();
        let err = FileReader::read_to_string(dir.path()).unwrap_err();
        assert!(matches!(err, CodesimError::Input { .. }));
        assert!(err.to_string().contains("not a regular file"));
    }

    #[test]
    fn test_binary_content_is_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&[0u8; 64]).unwrap();

        let err = FileReader::read_to_string(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("binary"));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = content_fingerprint("print(1)\n");
        let b = content_fingerprint("print(1)\n");
        let c = content_fingerprint("print(2)\n");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
