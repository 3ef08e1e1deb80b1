//! Envelope framing.
//!
//! # Wire format
//!
//! ```text
//! [4 bytes BE: metadata_len]
//! [4 bytes BE: payload_len]
//! [metadata_len bytes: UTF-8 JSON object]
//! [payload_len bytes: raw payload]
//! ```
//!
//! The codec knows nothing about field semantics. Decoding reads exactly
//! the announced byte counts; a stream that ends early yields
//! [`WireError::ConnectionClosed`].

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::envelope::{Envelope, Metadata};
use crate::error::WireError;

/// Size of the fixed length-prefix header.
pub const HEADER_LEN: usize = 8;

/// Upper bound on the buffer reserved up front for a section.
///
/// Larger sections still decode; the buffer grows as bytes arrive, so a
/// bogus length prefix cannot force a multi-GiB allocation by itself.
const PREALLOC_LIMIT: usize = 4 * 1024 * 1024;

fn section_len(section: &'static str, len: usize) -> Result<u32, WireError> {
    u32::try_from(len).map_err(|_| WireError::SectionTooLarge { section, len })
}

/// Encodes `metadata` and `payload` into one frame.
pub fn encode(metadata: &Metadata, payload: &[u8]) -> Result<Vec<u8>, WireError> {
    let json = serde_json::to_vec(metadata).map_err(WireError::Encoding)?;
    let json_len = section_len("metadata", json.len())?;
    let payload_len = section_len("payload", payload.len())?;

    let mut buf = Vec::with_capacity(HEADER_LEN + json.len() + payload.len());
    buf.extend_from_slice(&json_len.to_be_bytes());
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(&json);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Encodes a whole [`Envelope`].
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, WireError> {
    encode(&envelope.metadata, &envelope.payload)
}

/// Writes one envelope and flushes the stream.
pub async fn write_envelope<W: AsyncWrite + Unpin>(
    writer: &mut W,
    envelope: &Envelope,
) -> Result<(), WireError> {
    let frame = encode_envelope(envelope)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads exactly one envelope from the stream.
pub async fn read_envelope<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Envelope, WireError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let json_len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let payload_len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

    let json = read_section(reader, json_len).await?;
    let metadata: Metadata =
        serde_json::from_slice(&json).map_err(WireError::MalformedMetadata)?;
    let payload = read_section(reader, payload_len).await?;

    Ok(Envelope { metadata, payload })
}

async fn read_section<R: AsyncRead + Unpin>(
    reader: &mut R,
    len: usize,
) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    if len == 0 {
        return Ok(buf);
    }
    let n = (&mut *reader).take(len as u64).read_to_end(&mut buf).await?;
    if n < len {
        return Err(WireError::ConnectionClosed);
    }
    Ok(buf)
}
