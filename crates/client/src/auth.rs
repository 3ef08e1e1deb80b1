//! Login handshake.

use step_protocol::Request;
use step_protocol::constants::FIELD_TOKEN;
use step_transfer::md5_hex;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::error::StepError;
use crate::session::Session;

/// Password the protocol expects for `identifier`: the hex MD5 of the
/// identifier itself.
///
/// This is a fixed interoperability rule, not a secret.
pub fn derive_password(identifier: &str) -> String {
    md5_hex(identifier.as_bytes())
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Logs in as `identifier` and caches the returned token on the session.
    pub async fn login(&mut self, identifier: &str) -> Result<String, StepError> {
        let request = Request::Login {
            username: identifier.to_owned(),
            password: derive_password(identifier),
        };
        let response = self.send(&request, &[]).await?;
        if !response.is_ok() {
            warn!(status = ?response.status(), "login rejected");
            return Err(StepError::Authentication {
                response: response.into_metadata(),
            });
        }

        let token = match response.str_field(FIELD_TOKEN) {
            Some(token) if !token.trim().is_empty() => token.to_owned(),
            _ => {
                warn!("login response carries no token");
                return Err(StepError::Authentication {
                    response: response.into_metadata(),
                });
            }
        };

        self.token = Some(token.clone());
        info!(identifier, "logged in");
        Ok(token)
    }
}
