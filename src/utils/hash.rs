//! Hashing utilities.
//!
//! Two hashers, two jobs:
//! - `rustc_hash::FxHasher` for cheap in-memory keys (config reload detection)
//! - `blake3` for content fingerprints that end up in filenames
//!
//! # Usage
//!
//! ```ignore
//! use crate::utils::hash;
//!
//! let h = hash::compute("file contents");              // -> u64
//! let fp = hash::fingerprint_file(&path)?;             // -> "9f8c1a2b"
//! ```

use anyhow::{Context, Result};
use rustc_hash::FxHasher;
use std::fs::File;
use std::hash::Hasher;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Number of hex characters kept from the content hash for filenames.
pub const FINGERPRINT_LEN: usize = 8;

/// Compute a 64-bit FxHash from byte data.
#[inline]
pub fn compute<T: AsRef<[u8]> + ?Sized>(data: &T) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_ref());
    hasher.finish()
}

/// Compute a blake3 content fingerprint of a file, as 8 hex chars.
///
/// Streams the file so large images/videos don't get buffered whole.
/// Pure function of content: unchanged bytes yield an identical
/// fingerprint across runs.
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("failed to read {}", path.display()))?;

    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        }
    }

    let hex = hex::encode(hasher.finalize().as_bytes());
    Ok(hex[..FINGERPRINT_LEN].to_string())
}

/// Compute a blake3 fingerprint of in-memory bytes, as 8 hex chars.
#[inline]
pub fn fingerprint<T: AsRef<[u8]> + ?Sized>(data: &T) -> String {
    let hex = hex::encode(blake3::hash(data.as_ref()).as_bytes());
    hex[..FINGERPRINT_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_file_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logo.png");
        fs::write(&path, b"fake png bytes").unwrap();

        let a = fingerprint_file(&path).unwrap();
        let b = fingerprint_file(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_file_changes_with_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.css");
        fs::write(&path, "body { color: red; }").unwrap();
        let a = fingerprint_file(&path).unwrap();

        fs::write(&path, "body { color: blue; }").unwrap();
        let b = fingerprint_file(&path).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_file_missing() {
        let err = fingerprint_file(Path::new("/nonexistent/logo.png")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/logo.png"));
    }

    #[test]
    fn test_fingerprint_matches_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, b"contents").unwrap();

        assert_eq!(fingerprint(b"contents"), fingerprint_file(&path).unwrap());
    }

    #[test]
    fn test_compute_stable() {
        assert_eq!(compute("abc"), compute("abc"));
        assert_ne!(compute("abc"), compute("abd"));
    }
}
