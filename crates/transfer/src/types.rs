use serde::Serialize;

/// Progress event emitted after each acknowledged block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockProgress {
    pub key: String,
    /// Index of the block just completed.
    pub index: u64,
    pub total_block: u64,
    /// Payload bytes moved for this block.
    pub bytes: u64,
}

impl BlockProgress {
    /// Completion as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_block == 0 {
            return 0.0;
        }
        (self.index + 1) as f64 / self.total_block as f64 * 100.0
    }
}

/// Lifecycle of a single transfer.
///
/// `Idle -> Planning -> Transferring(index) -> Done`, or `Failed` from any
/// state once an error surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Planning,
    Transferring(u64),
    Done,
    Failed,
}

impl TransferState {
    /// `true` once the transfer can make no further progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}
