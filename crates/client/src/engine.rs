//! Block transfer engine.
//!
//! Blocks move strictly in order, one round trip each: block `i + 1` is
//! not requested until block `i` has been acknowledged. A rejected block
//! aborts the transfer; nothing is retried here.

use std::path::Path;

use step_protocol::Request;
use step_protocol::constants::FIELD_MD5;
use step_transfer::{
    BlockProgress, BlockReader, BlockSink, TransferPlan, TransferState, hash_file_with_buffer,
    verify,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::StepError;
use crate::session::Session;

/// Optional hooks for a single transfer.
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Receives one event per acknowledged block. Events are dropped when
    /// the channel is full; the transfer never waits on it.
    pub progress: Option<mpsc::Sender<BlockProgress>>,
    /// Checked before each block. Cancelling leaves the session usable
    /// because no frame is in flight at that point.
    pub cancel: Option<CancellationToken>,
}

impl TransferOptions {
    fn check_cancelled(&self) -> Result<(), StepError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(StepError::Cancelled),
            _ => Ok(()),
        }
    }

    fn report(&self, plan: &TransferPlan, index: u64, bytes: u64) {
        if let Some(tx) = &self.progress {
            let _ = tx.try_send(BlockProgress {
                key: plan.key.clone(),
                index,
                total_block: plan.total_block,
                bytes,
            });
        }
    }
}

/// Result of a completed upload or download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub key: String,
    pub total_size: u64,
    pub total_block: u64,
    /// Blocks actually exchanged; fewer than `total_block` when the server
    /// signalled completion early.
    pub blocks_sent: u64,
    /// Hex MD5 the server reports for the stored content.
    pub remote_md5: String,
}

/// A transfer plus the local integrity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub receipt: TransferReceipt,
    pub local_md5: String,
    /// `true` when the local and remote digests agree.
    pub verified: bool,
}

/// Tracks the state machine of one transfer for logging.
struct Tracker {
    state: TransferState,
}

impl Tracker {
    fn new() -> Self {
        Self {
            state: TransferState::Idle,
        }
    }

    fn enter(&mut self, next: TransferState) {
        debug!(from = ?self.state, to = ?next, "transfer state");
        self.state = next;
    }

    /// Marks the transfer failed if `result` is an error.
    fn settle<T>(&mut self, result: Result<T, StepError>) -> Result<T, StepError> {
        match result {
            Ok(value) => {
                self.enter(TransferState::Done);
                Ok(value)
            }
            Err(err) => {
                warn!(state = ?self.state, error = %err, "transfer failed");
                self.enter(TransferState::Failed);
                Err(err)
            }
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Uploads the file at `path`, optionally asking for `desired_key`.
    ///
    /// If a block response carries an md5 the upload stops there and that
    /// hash is the result. Otherwise, after the last block, the stored hash
    /// is fetched with one extra plan query.
    pub async fn upload_file(
        &mut self,
        path: &Path,
        desired_key: Option<&str>,
        options: &TransferOptions,
    ) -> Result<TransferReceipt, StepError> {
        let mut tracker = Tracker::new();
        let result = self
            .run_upload(path, desired_key, options, &mut tracker)
            .await;
        tracker.settle(result)
    }

    async fn run_upload(
        &mut self,
        path: &Path,
        desired_key: Option<&str>,
        options: &TransferOptions,
        tracker: &mut Tracker,
    ) -> Result<TransferReceipt, StepError> {
        self.require_token()?;
        let size = tokio::fs::metadata(path).await?.len();

        tracker.enter(TransferState::Planning);
        let plan = self.request_upload_plan(size, desired_key).await?;
        if !plan.is_consistent() {
            warn!(
                key = %plan.key,
                total_size = plan.total_size,
                block_size = plan.block_size,
                total_block = plan.total_block,
                "server block count disagrees with file size"
            );
        }

        let mut reader = BlockReader::open(path, &plan).await?;
        for index in 0..plan.total_block {
            options.check_cancelled()?;
            tracker.enter(TransferState::Transferring(index));

            let block = reader.read_block(index).await?;
            let request = Request::Upload {
                key: plan.key.clone(),
                block_index: index,
            };
            let response = self.send(&request, &block).await?;
            if !response.is_ok() {
                warn!(key = %plan.key, index, status = ?response.status(), "block rejected");
                return Err(StepError::BlockTransferFailed {
                    index,
                    response: response.into_metadata(),
                });
            }
            options.report(&plan, index, block.len() as u64);

            if let Some(md5) = response.str_field(FIELD_MD5) {
                if index + 1 < plan.total_block {
                    warn!(
                        key = %plan.key,
                        index,
                        total_block = plan.total_block,
                        "server reported completion before the final block"
                    );
                }
                info!(key = %plan.key, blocks = index + 1, "upload complete");
                return Ok(TransferReceipt {
                    key: plan.key,
                    total_size: plan.total_size,
                    total_block: plan.total_block,
                    blocks_sent: index + 1,
                    remote_md5: md5.to_owned(),
                });
            }
        }

        let remote_md5 = self.request_content_hash(&plan.key).await?;
        info!(key = %plan.key, blocks = plan.total_block, "upload complete");
        Ok(TransferReceipt {
            key: plan.key,
            total_size: plan.total_size,
            total_block: plan.total_block,
            blocks_sent: plan.total_block,
            remote_md5,
        })
    }

    /// Downloads `key` into `path`.
    ///
    /// The destination is preallocated to the planned size and each payload
    /// is written at `block_size * index`. Payload lengths are not checked:
    /// a short block leaves zero bytes behind and an overlong one is clipped
    /// at the file size. Compare the result against `remote_md5` (or use
    /// [`download_verified`](Self::download_verified)) to detect either.
    pub async fn download_file(
        &mut self,
        key: &str,
        path: &Path,
        options: &TransferOptions,
    ) -> Result<TransferReceipt, StepError> {
        let mut tracker = Tracker::new();
        let result = self.run_download(key, path, options, &mut tracker).await;
        tracker.settle(result)
    }

    async fn run_download(
        &mut self,
        key: &str,
        path: &Path,
        options: &TransferOptions,
        tracker: &mut Tracker,
    ) -> Result<TransferReceipt, StepError> {
        tracker.enter(TransferState::Planning);
        let plan = self.request_download_plan(key).await?;

        let mut sink = BlockSink::create(path, plan.total_size, plan.block_size).await?;
        for index in 0..plan.total_block {
            options.check_cancelled()?;
            tracker.enter(TransferState::Transferring(index));

            let request = Request::Download {
                key: plan.key.clone(),
                block_index: index,
            };
            let response = self.send(&request, &[]).await?;
            if !response.is_ok() {
                warn!(key = %plan.key, index, status = ?response.status(), "block rejected");
                return Err(StepError::BlockTransferFailed {
                    index,
                    response: response.into_metadata(),
                });
            }
            let kept = sink.write_block(index, response.payload()).await?;
            options.report(&plan, index, kept);
        }
        sink.finish().await?;

        info!(key = %plan.key, blocks = plan.total_block, size = plan.total_size, "download complete");
        Ok(TransferReceipt {
            key: plan.key,
            total_size: plan.total_size,
            total_block: plan.total_block,
            blocks_sent: plan.total_block,
            remote_md5: plan.content_hash.unwrap_or_default(),
        })
    }

    /// Hashes the local file, uploads it, and compares digests.
    ///
    /// A digest mismatch is reported in the outcome, not as an error.
    pub async fn upload_verified(
        &mut self,
        path: &Path,
        desired_key: Option<&str>,
        options: &TransferOptions,
    ) -> Result<TransferOutcome, StepError> {
        self.require_token()?;
        let local_md5 = hash_file_with_buffer(path, self.config.hash_buffer_size).await?;
        let receipt = self.upload_file(path, desired_key, options).await?;
        Ok(outcome(receipt, local_md5))
    }

    /// Downloads `key` into `path`, then hashes the written file and
    /// compares it with the plan's md5.
    pub async fn download_verified(
        &mut self,
        key: &str,
        path: &Path,
        options: &TransferOptions,
    ) -> Result<TransferOutcome, StepError> {
        let receipt = self.download_file(key, path, options).await?;
        let local_md5 = hash_file_with_buffer(path, self.config.hash_buffer_size).await?;
        Ok(outcome(receipt, local_md5))
    }
}

fn outcome(receipt: TransferReceipt, local_md5: String) -> TransferOutcome {
    let verified = verify(&local_md5, &receipt.remote_md5);
    if verified {
        info!(key = %receipt.key, md5 = %local_md5, "md5 match");
    } else {
        warn!(
            key = %receipt.key,
            local = %local_md5,
            remote = %receipt.remote_md5,
            "md5 mismatch"
        );
    }
    TransferOutcome {
        receipt,
        local_md5,
        verified,
    }
}
