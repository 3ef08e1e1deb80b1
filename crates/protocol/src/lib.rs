//! Wire protocol for STEP file and key-value transfers.
//!
//! Every message is one [`Envelope`]: JSON metadata plus an optional raw
//! payload, framed as described in [`wire`].

pub mod constants;
pub mod envelope;
pub mod error;
pub mod wire;

pub use constants::{DEFAULT_PORT, Direction, MessageType, Operation, STATUS_OK};
pub use envelope::{Envelope, Metadata, Request, Response};
pub use error::WireError;
