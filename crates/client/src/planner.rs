//! Upload and download plan negotiation.

use step_protocol::constants::{FIELD_BLOCK_SIZE, FIELD_KEY, FIELD_MD5, FIELD_SIZE, FIELD_TOTAL_BLOCK};
use step_protocol::{Request, Response};
use step_transfer::TransferPlan;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::error::StepError;
use crate::session::Session;

fn rejected(request: &Request, response: Response) -> StepError {
    warn!(
        request = %request.label(),
        status = ?response.status(),
        status_msg = ?response.status_msg(),
        "plan rejected"
    );
    StepError::PlanRejected {
        operation: request.label(),
        response: response.into_metadata(),
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Asks the server how to upload `size` bytes, optionally under
    /// `desired_key`. The server may keep, rename or refuse the key.
    ///
    /// The returned plan carries the server-assigned key and, if the server
    /// already knows it, the final content hash.
    pub async fn request_upload_plan(
        &mut self,
        size: u64,
        desired_key: Option<&str>,
    ) -> Result<TransferPlan, StepError> {
        let request = Request::FileSave {
            size,
            key: desired_key.map(str::to_owned),
        };
        let response = self.send(&request, &[]).await?;
        if !response.is_ok() {
            return Err(rejected(&request, response));
        }

        let (Some(key), Some(block_size), Some(total_block)) = (
            response.str_field(FIELD_KEY),
            response.u64_field(FIELD_BLOCK_SIZE),
            response.u64_field(FIELD_TOTAL_BLOCK),
        ) else {
            return Err(rejected(&request, response));
        };
        let content_hash = response.str_field(FIELD_MD5).map(str::to_owned);

        match TransferPlan::new(key, size, block_size, total_block, content_hash) {
            Ok(plan) => {
                debug!(
                    key = %plan.key,
                    block_size,
                    total_block,
                    "upload plan received"
                );
                Ok(plan)
            }
            Err(_) => Err(rejected(&request, response)),
        }
    }

    /// Fetches the plan of a stored file. Size, block size, block count and
    /// md5 must all be present.
    ///
    /// Also serves as the "describe file" query.
    pub async fn request_download_plan(&mut self, key: &str) -> Result<TransferPlan, StepError> {
        let request = Request::FileGet {
            key: key.to_owned(),
        };
        let response = self.send(&request, &[]).await?;
        if !response.is_ok() {
            return Err(rejected(&request, response));
        }

        let (Some(total_size), Some(block_size), Some(total_block), Some(md5)) = (
            response.u64_field(FIELD_SIZE),
            response.u64_field(FIELD_BLOCK_SIZE),
            response.u64_field(FIELD_TOTAL_BLOCK),
            response.str_field(FIELD_MD5),
        ) else {
            return Err(rejected(&request, response));
        };
        // Servers may echo the key; fall back to the one asked for.
        let key = response.str_field(FIELD_KEY).unwrap_or(key).to_owned();

        match TransferPlan::new(key, total_size, block_size, total_block, Some(md5.to_owned())) {
            Ok(plan) => {
                debug!(
                    key = %plan.key,
                    total_size,
                    block_size,
                    total_block,
                    "download plan received"
                );
                Ok(plan)
            }
            Err(_) => Err(rejected(&request, response)),
        }
    }

    /// Reads only the stored md5 of `key`; used to confirm an upload whose
    /// block responses did not carry the final hash.
    pub(crate) async fn request_content_hash(&mut self, key: &str) -> Result<String, StepError> {
        let request = Request::FileGet {
            key: key.to_owned(),
        };
        let response = self.send(&request, &[]).await?;
        if !response.is_ok() {
            return Err(rejected(&request, response));
        }
        match response.str_field(FIELD_MD5) {
            Some(md5) => Ok(md5.to_owned()),
            None => Err(rejected(&request, response)),
        }
    }
}
