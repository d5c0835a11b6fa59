//! Content digesting for change detection.
//!
//! Every tracked document is fingerprinted with SHA-256; a digest
//! mismatch between two scans means the document changed. This is
//! integrity/change detection, not a security boundary.

use crate::CoreError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Compute the hex SHA-256 digest of a byte slice.
///
/// Deterministic and pure; the same bytes always produce the same
/// 64-character lowercase hex string.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Read a file and compute its content digest.
pub async fn digest_file(path: &Path) -> Result<String, CoreError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(digest(&bytes))
}

/// Decode document bytes as UTF-8 text.
///
/// Documents are text by contract; bytes that do not decode are
/// reported against the owning path so callers can name the culprit.
pub fn decode_text(path: &Path, bytes: Vec<u8>) -> Result<String, CoreError> {
    String::from_utf8(bytes).map_err(|e| CoreError::Encoding {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_digest_deterministic() {
        let a = digest(b"memory bank contents");
        let b = digest(b"memory bank contents");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_digest_distinct_inputs() {
        assert_ne!(digest(b"alpha"), digest(b"beta"));
    }

    #[test]
    fn test_digest_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn test_digest_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "# Title\n\nbody\n").unwrap();

        let from_file = digest_file(&path).await.unwrap();
        assert_eq!(from_file, digest(b"# Title\n\nbody\n"));
    }

    #[tokio::test]
    async fn test_digest_file_missing() {
        let result = digest_file(&PathBuf::from("/nonexistent/doc.md")).await;
        assert!(matches!(result, Err(CoreError::Io(_))));
    }

    #[test]
    fn test_decode_text_rejects_invalid_utf8() {
        let result = decode_text(&PathBuf::from("bad.md"), vec![0xff, 0xfe, 0x00]);
        assert!(matches!(result, Err(CoreError::Encoding { .. })));
    }

    #[test]
    fn test_decode_text_ok() {
        let text = decode_text(&PathBuf::from("ok.md"), b"hello".to_vec()).unwrap();
        assert_eq!(text, "hello");
    }
}
