//! Agent dialing: the trait the engine fans out through, and the framed
//! transport implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dragnet_core::{
    AgentFrame, AgentRequest, CaptureOptions, CaptureResponse, Status, StatusResponse, Target,
};
use dragnet_wire::rustls::ClientConfig;
use dragnet_wire::{FramedConnection, WireError, WireResult};

/// One established, bidirectional capture connection to an agent.
#[async_trait]
pub trait AgentConnection: Send {
    /// Ask the agent for its health and compatibility level.
    async fn status(&mut self) -> WireResult<StatusResponse>;

    /// Send the start-capture request.
    async fn start(&mut self, options: CaptureOptions) -> WireResult<()>;

    /// Send the cooperative stop request without closing the read side.
    async fn send_stop(&mut self) -> WireResult<()>;

    /// Receive the next capture response. `None` means the agent finished
    /// gracefully.
    async fn recv(&mut self) -> WireResult<Option<CaptureResponse>>;
}

/// Establishes transport connections to agents.
#[async_trait]
pub trait AgentDialer: Send + Sync {
    /// The connection type this dialer produces.
    type Conn: AgentConnection + 'static;

    /// Dial one agent, bounded by `timeout`.
    async fn dial(&self, target: &Target, timeout: Duration) -> WireResult<Self::Conn>;
}

/// Production dialer over the framed wire transport (TCP or mutual TLS).
#[derive(Clone)]
pub struct WireDialer {
    tls: Option<Arc<ClientConfig>>,
}

impl WireDialer {
    /// A dialer using plain TCP.
    #[must_use]
    pub fn plaintext() -> Self {
        Self { tls: None }
    }

    /// A dialer using mutual TLS with the given client configuration.
    #[must_use]
    pub fn with_tls(config: Arc<ClientConfig>) -> Self {
        Self { tls: Some(config) }
    }
}

#[async_trait]
impl AgentDialer for WireDialer {
    type Conn = WireAgentConnection;

    async fn dial(&self, target: &Target, timeout: Duration) -> WireResult<Self::Conn> {
        let conn = tokio::time::timeout(timeout, dragnet_wire::dial(&target.address, self.tls.clone()))
            .await
            .map_err(|_| WireError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut)))??;
        Ok(WireAgentConnection { conn })
    }
}

/// [`AgentConnection`] over a framed transport connection.
pub struct WireAgentConnection {
    conn: FramedConnection,
}

#[async_trait]
impl AgentConnection for WireAgentConnection {
    async fn status(&mut self) -> WireResult<StatusResponse> {
        self.conn.send(&AgentRequest::Status).await?;
        match self.conn.recv::<AgentFrame>().await? {
            Some(AgentFrame::Status(status)) => Ok(status),
            Some(AgentFrame::Trailer(status)) => Err(WireError::Remote(status)),
            Some(AgentFrame::Response(_)) => Err(WireError::Remote(Status::internal(
                "unexpected capture response before status",
            ))),
            None => Err(WireError::UnexpectedEof),
        }
    }

    async fn start(&mut self, options: CaptureOptions) -> WireResult<()> {
        self.conn.send(&AgentRequest::Start { options }).await
    }

    async fn send_stop(&mut self) -> WireResult<()> {
        self.conn.send(&AgentRequest::Stop).await
    }

    async fn recv(&mut self) -> WireResult<Option<CaptureResponse>> {
        match self.conn.recv::<AgentFrame>().await? {
            Some(AgentFrame::Response(response)) => Ok(Some(response)),
            Some(AgentFrame::Trailer(status)) => Err(WireError::Remote(status)),
            Some(AgentFrame::Status(_)) => Err(WireError::Remote(Status::internal(
                "unexpected status frame mid-capture",
            ))),
            None => Ok(None),
        }
    }
}
