//! Error types for the STEP client.

use step_protocol::{Metadata, Operation, WireError};
use step_transfer::TransferError;

/// Socket-level failures. Any of these leaves the session unusable.
#[derive(Debug, thiserror::Error)]
pub enum TransportFailure {
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    #[error("timed out")]
    Timeout,

    /// The session was closed, or invalidated by an earlier failure.
    #[error("session is closed")]
    SessionClosed,
}

/// Errors produced by STEP client operations.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("transport failure: {0}")]
    Transport(#[from] TransportFailure),

    #[error("malformed metadata from peer: {0}")]
    MalformedMetadata(#[source] serde_json::Error),

    #[error("request cannot be encoded: {0}")]
    Encoding(#[source] WireError),

    #[error("login rejected: {}", render(.response))]
    Authentication { response: Metadata },

    #[error("not authenticated, call login first")]
    NotAuthenticated,

    #[error("{operation} plan rejected: {}", render(.response))]
    PlanRejected {
        operation: String,
        response: Metadata,
    },

    #[error("block {index} failed: {}", render(.response))]
    BlockTransferFailed { index: u64, response: Metadata },

    #[error("DATA {op} failed for key {}: {}", render_key(.key), render(.response))]
    KvOperationFailed {
        op: Operation,
        key: Option<String>,
        response: Metadata,
    },

    #[error("response carries no key: {}", render(.response))]
    MissingKeyInResponse { response: Metadata },

    /// A data record reuses a reserved DATA field name.
    #[error("record field `{0}` is reserved by the protocol")]
    ReservedField(String),

    #[error("transfer cancelled")]
    Cancelled,

    /// Local file or plan error; the session itself is unaffected.
    #[error(transparent)]
    Local(#[from] TransferError),
}

impl StepError {
    /// `true` when the session must be reconnected (and re-authenticated)
    /// before it can be used again.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::Transport(_) | Self::MalformedMetadata(_)
        )
    }
}

impl From<WireError> for StepError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::ConnectionClosed => Self::ConnectionClosed,
            WireError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                Self::Transport(TransportFailure::Timeout)
            }
            WireError::Io(e) => Self::Transport(TransportFailure::Io(e)),
            WireError::MalformedMetadata(e) => Self::MalformedMetadata(e),
            err @ (WireError::Encoding(_) | WireError::SectionTooLarge { .. }) => {
                Self::Encoding(err)
            }
        }
    }
}

impl From<std::io::Error> for StepError {
    fn from(err: std::io::Error) -> Self {
        Self::Local(TransferError::Io(err))
    }
}

fn render_key(key: &Option<String>) -> &str {
    key.as_deref().unwrap_or("<none>")
}

fn render(response: &Metadata) -> String {
    serde_json::to_string(response).unwrap_or_else(|_| "<unprintable>".into())
}
