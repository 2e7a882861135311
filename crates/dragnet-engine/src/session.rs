//! Per-agent capture sessions.
//!
//! A session owns its agent connection for its whole lifetime. It is built
//! in two steps: [`establish`] performs dial, status check, and capture
//! start under a timeout; [`EstablishedSession::run`] then drives the read
//! loop until the agent finishes, translating transport failures into
//! in-band control messages.

use std::time::Duration;

use dragnet_core::{
    CaptureOptions, CaptureResponse, Code, MessageKind, Target, MIN_COMPATIBILITY,
};
use dragnet_wire::WireError;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dialer::{AgentConnection, AgentDialer};
use crate::scope::CancelScope;

/// Capacity of one session's output channel.
pub(crate) const SESSION_CHANNEL_CAPACITY: usize = 100;

/// Lifecycle of one agent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport connection being established.
    Dialing,
    /// Status checked, start request in flight.
    Starting,
    /// Capture responses flowing.
    Running,
    /// Cooperative stop sent, draining until agent end-of-stream.
    Stopping,
    /// Session finished; its output channel is closed.
    Terminated,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Dialing => "dialing",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Terminated => "terminated",
        };
        write!(f, "{name}")
    }
}

/// Failure to bring a session up before any data was produced.
#[derive(Debug, Clone, Error)]
#[error("start capture for '{target}': {detail}")]
pub struct EstablishError {
    /// Identifier of the target that failed.
    pub target: String,
    /// What went wrong.
    pub detail: String,
}

impl EstablishError {
    fn new(target: &Target, detail: impl Into<String>) -> Self {
        Self {
            target: target.identifier.clone(),
            detail: detail.into(),
        }
    }
}

/// Dial `target`, check its status, and start the capture.
///
/// Each step is bounded by `timeout`. Failures here are reported to the
/// orchestrator, which decides whether they become in-band
/// `FAILED_TO_START` messages or fold into the terminal status.
///
/// # Errors
///
/// Returns an [`EstablishError`] naming the target and the failing step.
pub(crate) async fn establish<D: AgentDialer>(
    dialer: &D,
    target: &Target,
    options: &CaptureOptions,
    timeout: Duration,
) -> Result<EstablishedSession<D::Conn>, EstablishError> {
    debug!(target = %target, state = %SessionState::Dialing, "establishing session");
    let mut conn = dialer
        .dial(target, timeout)
        .await
        .map_err(|err| EstablishError::new(target, err.to_string()))?;

    let status = tokio::time::timeout(timeout, conn.status())
        .await
        .map_err(|_| EstablishError::new(target, "status request timed out"))?
        .map_err(|err| {
            EstablishError::new(target, format!("status request finished with error: {err}"))
        })?;

    if !status.healthy {
        return Err(EstablishError::new(
            target,
            format!("agent unhealthy: {}", status.message),
        ));
    }
    if status.compatibility_level < MIN_COMPATIBILITY {
        return Err(EstablishError::new(
            target,
            format!(
                "incompatible versions: expected compatibility level {MIN_COMPATIBILITY}+ \
                 but got {}",
                status.compatibility_level
            ),
        ));
    }

    debug!(target = %target, state = %SessionState::Starting, "starting capture");
    conn.start(options.clone())
        .await
        .map_err(|err| EstablishError::new(target, err.to_string()))?;

    Ok(EstablishedSession {
        target: target.clone(),
        conn,
        state: SessionState::Running,
    })
}

/// A session whose capture stream is up and running.
#[derive(Debug)]
pub(crate) struct EstablishedSession<C> {
    target: Target,
    conn: C,
    state: SessionState,
}

impl<C: AgentConnection + 'static> EstablishedSession<C> {
    /// Spawn the read loop. The returned channel carries this session's
    /// responses in agent order and closes when the session terminates.
    pub(crate) fn run(
        self,
        scope: CancelScope,
    ) -> (mpsc::Receiver<CaptureResponse>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let handle = tokio::spawn(self.read_loop(scope, tx));
        (rx, handle)
    }

    /// Read until the agent signals end-of-stream or the transport fails.
    ///
    /// On scope cancellation one cooperative stop is sent and reading
    /// continues: closing the read side early would tear down the agent
    /// connection before the stop could take effect.
    async fn read_loop(mut self, scope: CancelScope, tx: mpsc::Sender<CaptureResponse>) {
        let mut stop_sent = false;
        loop {
            let next = if stop_sent {
                self.conn.recv().await
            } else {
                tokio::select! {
                    () = scope.cancelled() => {
                        self.state = SessionState::Stopping;
                        debug!(target = %self.target, state = %self.state, "sending stop");
                        if let Err(err) = self.conn.send_stop().await {
                            let _ = tx.send(transport_error_message(&err, &self.target)).await;
                            break;
                        }
                        stop_sent = true;
                        continue;
                    }
                    next = self.conn.recv() => next,
                }
            };

            match next {
                Ok(Some(response)) => {
                    let response = self.stamp_source(response);
                    if tx.send(response).await.is_err() {
                        // Receiver gone; nothing left to report to.
                        break;
                    }
                }
                Ok(None) => {
                    let _ = tx
                        .send(CaptureResponse::message(
                            MessageKind::Stopped,
                            format!("capture has stopped gracefully: {}", self.target),
                        ))
                        .await;
                    break;
                }
                Err(err) => {
                    warn!(target = %self.target, error = %err, "capture stream failed");
                    let _ = tx.send(transport_error_message(&err, &self.target)).await;
                    break;
                }
            }
        }
        self.state = SessionState::Terminated;
        debug!(target = %self.target, state = %self.state, "session finished");
    }

    /// Attribute packets to this session's target when the agent did not.
    fn stamp_source(&self, response: CaptureResponse) -> CaptureResponse {
        match response {
            CaptureResponse::Packet(mut packet) if packet.source.is_empty() => {
                packet.source = self.target.identifier.clone();
                CaptureResponse::Packet(packet)
            }
            other => other,
        }
    }
}

/// Translate a transport failure into the in-band control message the client
/// sees for this target.
pub(crate) fn transport_error_message(err: &WireError, target: &Target) -> CaptureResponse {
    let kind = match err.code() {
        Code::InvalidArgument => MessageKind::InvalidRequest,
        Code::Unavailable => MessageKind::InstanceDisconnected,
        _ => MessageKind::ConnectionError,
    };
    CaptureResponse::message(kind, format!("capturing from agent {target}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dragnet_core::{ControlMessage, Packet, Status, StatusResponse};
    use dragnet_wire::WireResult;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// One scripted step of a mock agent connection's capture stream.
    #[derive(Debug)]
    enum Step {
        Response(CaptureResponse),
        Eof,
        Error(WireError),
        /// Block until the scope is cancelled and the stop arrives.
        WaitForStop,
    }

    #[derive(Debug)]
    struct MockConn {
        status: StatusResponse,
        steps: VecDeque<Step>,
        stops: Arc<AtomicUsize>,
        stop_seen: Arc<tokio::sync::Notify>,
    }

    impl MockConn {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                status: StatusResponse {
                    healthy: true,
                    compatibility_level: MIN_COMPATIBILITY,
                    message: String::new(),
                },
                steps: steps.into(),
                stops: Arc::new(AtomicUsize::new(0)),
                stop_seen: Arc::new(tokio::sync::Notify::new()),
            }
        }
    }

    #[async_trait]
    impl AgentConnection for MockConn {
        async fn status(&mut self) -> WireResult<StatusResponse> {
            Ok(self.status.clone())
        }

        async fn start(&mut self, _options: CaptureOptions) -> WireResult<()> {
            Ok(())
        }

        async fn send_stop(&mut self) -> WireResult<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.stop_seen.notify_waiters();
            Ok(())
        }

        async fn recv(&mut self) -> WireResult<Option<CaptureResponse>> {
            match self.steps.pop_front() {
                None | Some(Step::Eof) => Ok(None),
                Some(Step::Response(response)) => Ok(Some(response)),
                Some(Step::Error(err)) => Err(err),
                Some(Step::WaitForStop) => {
                    let notified = self.stop_seen.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();
                    if self.stops.load(Ordering::SeqCst) == 0 {
                        notified.await;
                    }
                    Ok(None)
                }
            }
        }
    }

    fn target() -> Target {
        Target::new("10.0.0.1:9494", "a1")
    }

    fn packet(data: &[u8]) -> CaptureResponse {
        CaptureResponse::Packet(Packet {
            data: data.to_vec(),
            timestamp: chrono::Utc::now(),
            source: String::new(),
        })
    }

    fn session(conn: MockConn) -> EstablishedSession<MockConn> {
        EstablishedSession {
            target: target(),
            conn,
            state: SessionState::Running,
        }
    }

    async fn collect(mut rx: mpsc::Receiver<CaptureResponse>) -> Vec<CaptureResponse> {
        let mut out = Vec::new();
        while let Some(msg) = rx.recv().await {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_eof_emits_graceful_stop() {
        let conn = MockConn::new(vec![Step::Response(packet(b"one")), Step::Eof]);
        let (rx, handle) = session(conn).run(CancelScope::new());

        let got = collect(rx).await;
        handle.await.unwrap();

        assert_eq!(got.len(), 2);
        assert!(got[0].is_packet());
        match &got[1] {
            CaptureResponse::Message(ControlMessage { kind, text }) => {
                assert_eq!(*kind, MessageKind::Stopped);
                assert!(text.contains("a1"), "{text}");
            }
            other => panic!("expected stop message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_packet_source_is_stamped() {
        let conn = MockConn::new(vec![Step::Response(packet(b"one")), Step::Eof]);
        let (rx, handle) = session(conn).run(CancelScope::new());

        let got = collect(rx).await;
        handle.await.unwrap();

        match &got[0] {
            CaptureResponse::Packet(packet) => assert_eq!(packet.source, "a1"),
            other => panic!("expected packet, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_mapping() {
        let cases = vec![
            (
                WireError::Remote(Status::invalid_argument("bad filter")),
                MessageKind::InvalidRequest,
            ),
            (
                WireError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset)),
                MessageKind::InstanceDisconnected,
            ),
            (
                WireError::Remote(Status::internal("agent crashed")),
                MessageKind::ConnectionError,
            ),
            (
                WireError::Remote(Status::unknown("who knows")),
                MessageKind::ConnectionError,
            ),
        ];

        for (err, expected) in cases {
            let conn = MockConn::new(vec![Step::Error(err)]);
            let (rx, handle) = session(conn).run(CancelScope::new());
            let got = collect(rx).await;
            handle.await.unwrap();

            assert_eq!(got.len(), 1);
            match &got[0] {
                CaptureResponse::Message(ControlMessage { kind, .. }) => {
                    assert_eq!(*kind, expected);
                }
                other => panic!("expected control message, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_cancellation_sends_exactly_one_stop_and_drains() {
        let conn = MockConn::new(vec![Step::WaitForStop]);
        let stops = conn.stops.clone();

        let scope = CancelScope::new();
        let (rx, handle) = session(conn).run(scope.clone());

        scope.cancel(None);
        // Cancelling twice must not produce a second stop.
        scope.cancel(None);

        let got = collect(rx).await;
        handle.await.unwrap();

        assert_eq!(stops.load(Ordering::SeqCst), 1);
        // The drain after stop still surfaces the graceful end-of-stream.
        assert!(matches!(
            &got[..],
            [CaptureResponse::Message(ControlMessage {
                kind: MessageKind::Stopped,
                ..
            })]
        ));
    }

    #[tokio::test]
    async fn test_establish_rejects_unhealthy_agent() {
        let mut conn = MockConn::new(vec![]);
        conn.status = StatusResponse {
            healthy: false,
            compatibility_level: MIN_COMPATIBILITY,
            message: "no capture device".into(),
        };

        let dialer = ReadyDialer::new(conn);
        let err = establish(&dialer, &target(), &options(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.detail.contains("unhealthy"), "{err}");
    }

    #[tokio::test]
    async fn test_establish_rejects_incompatible_agent() {
        let mut conn = MockConn::new(vec![]);
        conn.status = StatusResponse {
            healthy: true,
            compatibility_level: MIN_COMPATIBILITY - 1,
            message: String::new(),
        };

        let dialer = ReadyDialer::new(conn);
        let err = establish(&dialer, &target(), &options(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.detail.contains("incompatible"), "{err}");
    }

    #[tokio::test]
    async fn test_establish_accepts_healthy_compatible_agent() {
        let conn = MockConn::new(vec![Step::Eof]);
        let dialer = ReadyDialer::new(conn);
        assert!(
            establish(&dialer, &target(), &options(), Duration::from_secs(1))
                .await
                .is_ok()
        );
    }

    fn options() -> CaptureOptions {
        CaptureOptions {
            device: "en0".into(),
            filter: String::new(),
            snap_len: 65_000,
        }
    }

    /// Dialer handing out one pre-built connection.
    struct ReadyDialer {
        conn: std::sync::Mutex<Option<MockConn>>,
    }

    impl ReadyDialer {
        fn new(conn: MockConn) -> Self {
            Self {
                conn: std::sync::Mutex::new(Some(conn)),
            }
        }
    }

    #[async_trait]
    impl AgentDialer for ReadyDialer {
        type Conn = MockConn;

        async fn dial(&self, _target: &Target, _timeout: Duration) -> WireResult<Self::Conn> {
            Ok(self.conn.lock().unwrap().take().expect("dialed twice"))
        }
    }
}
