use serde::Serialize;

use crate::TransferError;

/// Peer-issued parameters governing one file transfer.
///
/// The last block may be shorter than `block_size`; its length is derived
/// from `total_size` and never carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferPlan {
    pub key: String,
    pub total_size: u64,
    pub block_size: u64,
    pub total_block: u64,
    /// Hex MD5 of the stored content, when the peer reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl TransferPlan {
    /// Builds a plan, rejecting zero block sizes and zero block counts.
    pub fn new(
        key: impl Into<String>,
        total_size: u64,
        block_size: u64,
        total_block: u64,
        content_hash: Option<String>,
    ) -> Result<Self, TransferError> {
        if block_size == 0 {
            return Err(TransferError::InvalidPlan("block_size must be positive".into()));
        }
        if total_block == 0 {
            return Err(TransferError::InvalidPlan("total_block must be positive".into()));
        }
        Ok(Self {
            key: key.into(),
            total_size,
            block_size,
            total_block,
            content_hash,
        })
    }

    /// Number of blocks a file of `total_size` bytes splits into.
    ///
    /// An empty file still counts as one (empty) block.
    pub fn expected_total_block(total_size: u64, block_size: u64) -> u64 {
        if total_size == 0 || block_size == 0 {
            1
        } else {
            total_size.div_ceil(block_size)
        }
    }

    /// Byte offset of block `index`.
    pub fn block_offset(&self, index: u64) -> u64 {
        self.block_size.saturating_mul(index)
    }

    /// Length of block `index`: `block_size`, except the final block which
    /// holds whatever remains of `total_size`.
    pub fn block_len(&self, index: u64) -> Result<u64, TransferError> {
        if index >= self.total_block {
            return Err(TransferError::BlockOutOfRange {
                index,
                total_block: self.total_block,
            });
        }
        if index == self.total_block - 1 {
            Ok(self.total_size.saturating_sub(self.block_offset(index)))
        } else {
            Ok(self.block_size)
        }
    }

    /// `true` when `total_block` agrees with `total_size / block_size`.
    pub fn is_consistent(&self) -> bool {
        self.total_block == Self::expected_total_block(self.total_size, self.block_size)
    }
}
