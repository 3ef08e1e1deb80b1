use std::io::SeekFrom;
use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::warn;

use crate::TransferError;
use crate::plan::TransferPlan;

// ---------------------------------------------------------------------------
// BlockReader
// ---------------------------------------------------------------------------

/// Reads the blocks of a local file as laid out by a [`TransferPlan`].
pub struct BlockReader {
    file: tokio::fs::File,
    plan: TransferPlan,
}

impl BlockReader {
    /// Opens `path` for block reads under `plan`.
    pub async fn open(path: &Path, plan: &TransferPlan) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self {
            file,
            plan: plan.clone(),
        })
    }

    /// Reads block `index`: exactly `block_size` bytes at `block_size * index`,
    /// or only the remainder for the final block.
    ///
    /// A file shorter than the plan claims fails with an I/O error rather
    /// than producing a short block.
    pub async fn read_block(&mut self, index: u64) -> Result<Vec<u8>, TransferError> {
        let len = self.plan.block_len(index)?;
        let len = usize::try_from(len)
            .map_err(|_| TransferError::InvalidPlan(format!("block of {len} bytes")))?;
        self.file
            .seek(SeekFrom::Start(self.plan.block_offset(index)))
            .await?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// BlockSink
// ---------------------------------------------------------------------------

/// Destination file for a download, preallocated to its final size.
///
/// Writes land at `block_size * index` and are clipped to the file size,
/// so the sink never grows past `total_size`. A short block leaves zero
/// bytes behind; the caller's hash check catches that.
pub struct BlockSink {
    file: tokio::fs::File,
    total_size: u64,
    block_size: u64,
}

impl BlockSink {
    /// Creates (or truncates) `path` and sizes it to `total_size` bytes.
    pub async fn create(
        path: &Path,
        total_size: u64,
        block_size: u64,
    ) -> Result<Self, TransferError> {
        if block_size == 0 {
            return Err(TransferError::InvalidPlan("block_size must be positive".into()));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await?;
        file.set_len(total_size).await?;
        Ok(Self {
            file,
            total_size,
            block_size,
        })
    }

    /// Writes `data` as block `index`. Returns the number of bytes kept.
    pub async fn write_block(&mut self, index: u64, data: &[u8]) -> Result<u64, TransferError> {
        let offset = self.block_size.saturating_mul(index);
        let room = self.total_size.saturating_sub(offset);
        let keep = (data.len() as u64).min(room);
        if keep < data.len() as u64 {
            warn!(
                index,
                received = data.len(),
                kept = keep,
                "block overruns file size, excess dropped"
            );
        }
        if keep == 0 {
            return Ok(0);
        }
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.write_all(&data[..keep as usize]).await?;
        Ok(keep)
    }

    /// Flushes buffered data to disk.
    pub async fn finish(mut self) -> Result<(), TransferError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }
}
