//! Error types for the framing codec.

use std::io;

/// Errors produced while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The stream ended before a complete envelope was read.
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("metadata cannot be encoded: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("malformed metadata: {0}")]
    MalformedMetadata(#[source] serde_json::Error),

    /// A section does not fit its 32-bit length field.
    #[error("{section} section too large: {len} bytes (max {})", u32::MAX)]
    SectionTooLarge { section: &'static str, len: usize },
}

impl From<io::Error> for WireError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            WireError::ConnectionClosed
        } else {
            WireError::Io(err)
        }
    }
}
