//! STEP client.
//!
//! A [`Session`] owns one TCP connection and the token issued at login.
//! File transfers, plan queries and key-value operations are methods on
//! the session; each is a sequence of strict request/response round trips.
//!
//! ```no_run
//! # async fn demo() -> Result<(), step_client::StepError> {
//! use std::path::Path;
//! use step_client::{ClientConfig, Session, TransferOptions};
//!
//! let config = ClientConfig {
//!     identifier: Some("2025123456".into()),
//!     ..ClientConfig::default()
//! };
//! let mut session = Session::open(&config).await?;
//! let outcome = session
//!     .upload_verified(Path::new("report.pdf"), None, &TransferOptions::default())
//!     .await?;
//! assert!(outcome.verified);
//! session.bye().await;
//! # Ok(())
//! # }
//! ```

mod auth;
pub mod config;
mod engine;
pub mod error;
mod kv;
mod planner;
mod session;

pub use auth::derive_password;
pub use config::{ClientConfig, ConfigError, SessionConfig};
pub use engine::{TransferOptions, TransferOutcome, TransferReceipt};
pub use error::{StepError, TransportFailure};
pub use session::Session;

pub use step_protocol::{Metadata, Operation};
pub use step_transfer::{BlockProgress, TransferPlan, TransferState};
