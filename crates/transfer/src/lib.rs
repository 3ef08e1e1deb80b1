//! Block-level file transfer support for STEP.
//!
//! A [`TransferPlan`] fixes how a file is cut into blocks; [`BlockReader`]
//! and [`BlockSink`] move those blocks between disk and memory, and the
//! [`checksum`] helpers verify the end result.

pub mod checksum;
mod chunked;
mod plan;
mod types;

pub use checksum::{HASH_BUFFER_SIZE, hash_file, hash_file_with_buffer, md5_hex, verify};
pub use chunked::{BlockReader, BlockSink};
pub use plan::TransferPlan;
pub use types::{BlockProgress, TransferState};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("block index {index} out of range (total_block {total_block})")]
    BlockOutOfRange { index: u64, total_block: u64 },
}
