//! Key-value operations in the DATA domain.
//!
//! A record is a flat JSON object. On save its fields travel inside the
//! request metadata next to the DATA fields, so a record may not use any
//! name from [`RECORD_RESERVED_FIELDS`](step_protocol::constants::RECORD_RESERVED_FIELDS).

use step_protocol::constants::{FIELD_KEY, is_reserved_record_field};
use step_protocol::{Metadata, Operation, Request, Response};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::error::StepError;
use crate::session::Session;

fn kv_failed(op: Operation, key: Option<&str>, response: Response) -> StepError {
    warn!(
        op = %op,
        key = key.unwrap_or("<none>"),
        status = ?response.status(),
        "DATA request rejected"
    );
    StepError::KvOperationFailed {
        op,
        key: key.map(str::to_owned),
        response: response.into_metadata(),
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Stores `record`, optionally under `key`, and returns the key the
    /// server filed it under.
    ///
    /// The server must name the key in its reply even when one was given.
    pub async fn kv_save(&mut self, record: Metadata, key: Option<&str>) -> Result<String, StepError> {
        if let Some(name) = record.keys().find(|name| is_reserved_record_field(name)) {
            return Err(StepError::ReservedField(name.clone()));
        }

        let request = Request::DataSave {
            key: key.map(str::to_owned),
            record,
        };
        let response = self.send(&request, &[]).await?;
        if !response.is_ok() {
            return Err(kv_failed(Operation::Save, key, response));
        }

        match response.str_field(FIELD_KEY) {
            Some(stored) => {
                debug!(key = stored, "record saved");
                Ok(stored.to_owned())
            }
            None => Err(StepError::MissingKeyInResponse {
                response: response.into_metadata(),
            }),
        }
    }

    /// Fetches the record stored under `key`.
    ///
    /// Reserved fields (`status`, `key`, `type`, ...) are removed from the
    /// reply; whatever remains is the record.
    pub async fn kv_get(&mut self, key: &str) -> Result<Metadata, StepError> {
        let request = Request::DataGet {
            key: key.to_owned(),
        };
        let response = self.send(&request, &[]).await?;
        if !response.is_ok() {
            return Err(kv_failed(Operation::Get, Some(key), response));
        }

        let mut record = response.into_metadata();
        record.retain(|name, _| !is_reserved_record_field(name));
        Ok(record)
    }

    /// Deletes the record stored under `key`.
    pub async fn kv_delete(&mut self, key: &str) -> Result<(), StepError> {
        let request = Request::DataDelete {
            key: key.to_owned(),
        };
        let response = self.send(&request, &[]).await?;
        if !response.is_ok() {
            return Err(kv_failed(Operation::Delete, Some(key), response));
        }
        debug!(key, "record deleted");
        Ok(())
    }
}
