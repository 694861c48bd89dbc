//! Content digests

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// Short stable token derived from `data`, used for object names that must be
/// identical across replays of the same input.
///
/// `len` is clamped to the digest length (64 hex chars).
pub fn stable_token(data: impl AsRef<[u8]>, len: usize) -> String {
    let mut digest = sha256_hex(data);
    digest.truncate(len.min(64));
    digest
}
