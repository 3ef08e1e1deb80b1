//! Transport session: one connection, one request in flight.

use std::future::Future;
use std::time::Duration;

use step_protocol::{Envelope, Metadata, Request, Response, WireError, wire};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, SessionConfig};
use crate::error::{StepError, TransportFailure};

/// A connection to a STEP server plus the token issued at login.
///
/// Every call is a blocking round trip: one envelope written, one envelope
/// read back. Calls take `&mut self`, so requests on one session can never
/// interleave. A transport failure drops the connection; later calls fail
/// with [`TransportFailure::SessionClosed`] until a new session is opened.
pub struct Session<S = TcpStream> {
    stream: Option<S>,
    pub(crate) token: Option<String>,
    pub(crate) config: SessionConfig,
}

impl Session<TcpStream> {
    /// Opens a TCP connection to `addr`.
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        config: SessionConfig,
    ) -> Result<Self, StepError> {
        let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
        {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return Err(TransportFailure::Io(e).into()),
            Err(_) => return Err(TransportFailure::Timeout.into()),
        };
        stream
            .set_nodelay(true)
            .map_err(TransportFailure::Io)?;
        if let Ok(peer) = stream.peer_addr() {
            info!(%peer, "connected to STEP server");
        }
        Ok(Self::from_stream(stream, config))
    }

    /// Connects as described by `config` and logs in when it names an
    /// identifier.
    pub async fn open(config: &ClientConfig) -> Result<Self, StepError> {
        let mut session = Self::connect(config.address(), config.session_config()).await?;
        if let Some(identifier) = &config.identifier {
            session.login(identifier).await?;
        }
        Ok(session)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Wraps an already-connected stream.
    pub fn from_stream(stream: S, config: SessionConfig) -> Self {
        Self {
            stream: Some(stream),
            token: None,
            config,
        }
    }

    /// Sends one envelope and waits for the response envelope.
    pub async fn roundtrip(
        &mut self,
        metadata: &Metadata,
        payload: &[u8],
    ) -> Result<Response, StepError> {
        // Encoding failures happen before anything touches the socket.
        let frame = wire::encode(metadata, payload)?;
        let io_timeout = self.config.io_timeout;
        let stream = self
            .stream
            .as_mut()
            .ok_or(StepError::Transport(TransportFailure::SessionClosed))?;

        let result = exchange(stream, &frame, io_timeout).await;
        match result {
            Ok(envelope) => Ok(Response::from(envelope)),
            Err(err) => {
                if err.invalidates_session() {
                    warn!(error = %err, "transport failure, dropping connection");
                    self.stream = None;
                    self.token = None;
                }
                Err(err)
            }
        }
    }

    /// Sends a typed request, attaching the session token when the request
    /// needs one.
    ///
    /// Fails with [`StepError::NotAuthenticated`] before any I/O when a token
    /// is required but missing.
    pub(crate) async fn send(
        &mut self,
        request: &Request,
        payload: &[u8],
    ) -> Result<Response, StepError> {
        let metadata = if request.requires_token() {
            request.to_metadata(Some(self.require_token()?))
        } else {
            request.to_metadata(None)
        };
        debug!(
            request = %request.label(),
            payload_len = payload.len(),
            "sending request"
        );
        let response = self.roundtrip(&metadata, payload).await?;
        debug!(
            request = %request.label(),
            status = ?response.status(),
            payload_len = response.payload().len(),
            "received response"
        );
        Ok(response)
    }

    pub(crate) fn require_token(&self) -> Result<&str, StepError> {
        self.token.as_deref().ok_or(StepError::NotAuthenticated)
    }

    /// The bearer token from the last successful login.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// `false` after [`close`](Self::close) or a transport failure.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Tells the server the client is leaving, then closes.
    ///
    /// The BYE notice is only sent while logged in. No response is awaited
    /// and write errors are ignored.
    pub async fn bye(&mut self) {
        if let (Some(token), Some(stream)) = (self.token.as_deref(), self.stream.as_mut()) {
            let notice = Request::Bye.to_metadata(Some(token));
            match wire::encode(&notice, &[]) {
                Ok(frame) => {
                    let sent = with_timeout(self.config.io_timeout, async {
                        stream.write_all(&frame).await?;
                        stream.flush().await?;
                        Ok::<(), WireError>(())
                    })
                    .await;
                    if let Err(e) = sent {
                        debug!(error = %e, "BYE not delivered");
                    }
                }
                Err(e) => debug!(error = %e, "BYE not encoded"),
            }
        }
        self.close().await;
    }

    /// Releases the connection and forgets the token. Safe to call twice.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "shutdown on close failed");
            }
            info!("session closed");
        }
        self.token = None;
    }
}

async fn exchange<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    frame: &[u8],
    io_timeout: Option<Duration>,
) -> Result<Envelope, StepError> {
    with_timeout(io_timeout, async {
        stream.write_all(frame).await?;
        stream.flush().await?;
        Ok::<(), WireError>(())
    })
    .await?;
    with_timeout(io_timeout, wire::read_envelope(stream)).await
}

async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> Result<T, StepError>
where
    F: Future<Output = Result<T, WireError>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(StepError::from),
            Err(_) => Err(TransportFailure::Timeout.into()),
        },
        None => fut.await.map_err(StepError::from),
    }
}
