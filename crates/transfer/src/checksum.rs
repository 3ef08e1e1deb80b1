//! MD5 integrity checks.
//!
//! MD5 is what the protocol exchanges; it guards against corruption, not
//! tampering.

use std::path::Path;

use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;

use crate::TransferError;

/// Read size used when hashing files (1 MiB).
pub const HASH_BUFFER_SIZE: usize = 1024 * 1024;

/// Computes the lowercase hex MD5 of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Computes the hex MD5 of a file, streaming it in [`HASH_BUFFER_SIZE`] reads.
pub async fn hash_file(path: &Path) -> Result<String, TransferError> {
    hash_file_with_buffer(path, HASH_BUFFER_SIZE).await
}

/// Like [`hash_file`] with a caller-chosen read size (0 means the default).
pub async fn hash_file_with_buffer(
    path: &Path,
    buffer_size: usize,
) -> Result<String, TransferError> {
    let buffer_size = if buffer_size == 0 {
        HASH_BUFFER_SIZE
    } else {
        buffer_size
    };
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; buffer_size];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compares two hex digests case-insensitively.
///
/// An empty remote digest never verifies.
pub fn verify(local: &str, remote: &str) -> bool {
    !remote.is_empty() && local.eq_ignore_ascii_case(remote)
}
