//! SHA-256 content hashing and blob integrity verification

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Chunk size for streaming file hashes; blobs can be large.
const READ_CHUNK: usize = 8192;

/// Hex-encoded SHA-256 digest of a byte slice.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex-encoded SHA-256 digest of a file, computed in streaming chunks.
///
/// A missing file maps to [`Error::NotFound`] rather than a raw I/O error
/// so callers can treat references to since-deleted blobs uniformly.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::not_found(format!("blob {}", path.display())));
        }
        Err(e) => return Err(Error::io(e, path, "open")),
    };

    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::io(e, path, "read"))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Recompute a file's digest and compare it to the recorded one.
///
/// Returns [`Error::IntegrityViolation`] on mismatch, [`Error::NotFound`]
/// if the file is gone. `what` names the blob in error messages.
pub fn verify_file(path: &Path, expected: &str, what: &str) -> Result<()> {
    let actual = hash_file(path)?;
    if actual == expected {
        Ok(())
    } else {
        Err(Error::integrity(what, expected, actual))
    }
}
