//! Content fingerprints for cache keys.

use std::io::Read;

use anyhow::{Context, Result};
use camino::Utf8Path;

/// Length of a fingerprint in hex characters (256-bit BLAKE3).
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// BLAKE3 of `bytes` as lowercase hex.
#[must_use]
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Streaming fingerprint of a file's raw bytes.
pub fn fingerprint_file(path: &Utf8Path) -> Result<String> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("Failed to open {path} for hashing"))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read {path}"))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// True when `key` has the shape of a fingerprint produced by this module.
#[must_use]
pub fn is_fingerprint(key: &str) -> bool {
    key.len() == FINGERPRINT_HEX_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
