//! A scripted capture agent server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dragnet_core::{
    AgentFrame, AgentRequest, CaptureResponse, StatusResponse, MIN_COMPATIBILITY,
};
use dragnet_wire::Listener;
use tokio::task::JoinHandle;
use tracing::debug;

/// A scripted agent: answers one status request, then streams its scripted
/// responses after a start request and ends with a clean end-of-stream.
///
/// Built with a fluent API, mirroring how tests queue behaviour:
///
/// ```rust,no_run
/// # use dragnet_test::MockAgent;
/// # async fn demo() {
/// let agent = MockAgent::new()
///     .with_packets(3, 100)
///     .wait_for_stop()
///     .serve()
///     .await;
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockAgent {
    status: StatusResponse,
    responses: Vec<CaptureResponse>,
    wait_for_stop: bool,
}

impl Default for MockAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAgent {
    /// A healthy, compatible agent with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusResponse {
                healthy: true,
                compatibility_level: MIN_COMPATIBILITY,
                message: String::new(),
            },
            responses: Vec::new(),
            wait_for_stop: false,
        }
    }

    /// Override the status reply.
    #[must_use]
    pub fn with_status(mut self, status: StatusResponse) -> Self {
        self.status = status;
        self
    }

    /// Script `count` packets of `len` bytes each.
    #[must_use]
    pub fn with_packets(mut self, count: usize, len: usize) -> Self {
        for _ in 0..count {
            self.responses
                .push(CaptureResponse::Packet(dragnet_core::Packet {
                    data: vec![0xAB; len],
                    timestamp: chrono::Utc::now(),
                    source: String::new(),
                }));
        }
        self
    }

    /// Script an arbitrary response.
    #[must_use]
    pub fn with_response(mut self, response: CaptureResponse) -> Self {
        self.responses.push(response);
        self
    }

    /// Keep the capture open after the scripted responses until the API
    /// sends a stop request.
    #[must_use]
    pub fn wait_for_stop(mut self) -> Self {
        self.wait_for_stop = true;
        self
    }

    /// Bind an ephemeral port and serve connections until dropped.
    ///
    /// # Panics
    ///
    /// Panics if the ephemeral port cannot be bound; acceptable in tests.
    pub async fn serve(self) -> MockAgentHandle {
        let listener = Listener::bind("127.0.0.1:0", None)
            .await
            .expect("bind mock agent");
        let address = listener
            .local_addr()
            .expect("mock agent local addr")
            .to_string();
        let stops = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn({
            let stops = stops.clone();
            async move {
                loop {
                    let Ok((conn, peer)) = listener.accept().await else {
                        break;
                    };
                    debug!(%peer, "mock agent accepted connection");
                    let agent = self.clone();
                    let stops = stops.clone();
                    tokio::spawn(async move {
                        agent.handle(conn, &stops).await;
                    });
                }
            }
        });

        MockAgentHandle {
            address,
            stops,
            task,
        }
    }

    async fn handle(self, mut conn: dragnet_wire::FramedConnection, stops: &AtomicUsize) {
        // Status handshake.
        match conn.recv::<AgentRequest>().await {
            Ok(Some(AgentRequest::Status)) => {
                if conn
                    .send(&AgentFrame::Status(self.status.clone()))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            _ => return,
        }

        // Start request.
        match conn.recv::<AgentRequest>().await {
            Ok(Some(AgentRequest::Start { .. })) => {}
            _ => return,
        }

        for response in &self.responses {
            if conn
                .send(&AgentFrame::Response(response.clone()))
                .await
                .is_err()
            {
                return;
            }
        }

        if self.wait_for_stop {
            loop {
                match conn.recv::<AgentRequest>().await {
                    Ok(Some(AgentRequest::Stop)) => {
                        stops.fetch_add(1, Ordering::SeqCst);
                        break;
                    }
                    Ok(Some(_)) => {}
                    _ => return,
                }
            }
        }

        // Clean end-of-stream.
        let (_, mut writer) = conn.split();
        let _ = writer.shutdown().await;
    }
}

/// Handle to a served [`MockAgent`].
pub struct MockAgentHandle {
    address: String,
    stops: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockAgentHandle {
    /// The `host:port` address the agent listens on.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// How many stop requests the agent has received.
    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Drop for MockAgentHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
