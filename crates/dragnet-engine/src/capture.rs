//! The capture orchestrator: one call drives one client stream end to end.

use std::sync::Arc;
use std::time::Duration;

use dragnet_core::{validate_start, CaptureResponse, MessageKind, Status};
use futures::future;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{AllowAllPolicy, AllowAllVerifier, TenantPolicy, TokenVerifier};
use crate::dialer::AgentDialer;
use crate::forward::{forward, BufferPolicy};
use crate::merge::merge;
use crate::resolve::TargetResolver;
use crate::scope::CancelScope;
use crate::session;
use crate::stream::{RequestSource, ResponseSink};
use crate::watch::watch_for_stop;

/// Default bound on dial and status-request calls during session
/// establishment.
const DEFAULT_ESTABLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// The capture fan-out engine.
///
/// Holds the service-wide collaborators; every client stream is served by
/// one [`CaptureEngine::capture`] call.
pub struct CaptureEngine<D> {
    dialer: D,
    resolver: Arc<dyn TargetResolver>,
    verifier: Arc<dyn TokenVerifier>,
    policy: Arc<dyn TenantPolicy>,
    buffer: BufferPolicy,
    establish_timeout: Duration,
}

impl<D: AgentDialer> CaptureEngine<D> {
    /// Create an engine with permissive authorization defaults and the
    /// default buffer policy.
    pub fn new(dialer: D, resolver: Arc<dyn TargetResolver>) -> Self {
        Self {
            dialer,
            resolver,
            verifier: Arc::new(AllowAllVerifier),
            policy: Arc::new(AllowAllPolicy),
            buffer: BufferPolicy::default(),
            establish_timeout: DEFAULT_ESTABLISH_TIMEOUT,
        }
    }

    /// Replace the token verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replace the tenant policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn TenantPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Set the forwarder buffer policy.
    #[must_use]
    pub fn with_buffer(mut self, buffer: BufferPolicy) -> Self {
        self.buffer = buffer;
        self
    }

    /// Set the session establishment timeout.
    #[must_use]
    pub fn with_establish_timeout(mut self, timeout: Duration) -> Self {
        self.establish_timeout = timeout;
        self
    }

    /// Serve one client capture stream.
    ///
    /// Runs the full lifecycle: receive and validate the start request,
    /// gate and authorize it, resolve targets, fan out agent sessions,
    /// merge and forward their output, and close the stream with a terminal
    /// status once everything has drained. The returned status is the one
    /// delivered on the trailer.
    pub async fn capture<Src, Snk>(&self, mut source: Src, sink: Snk) -> Status
    where
        Src: RequestSource + 'static,
        Snk: ResponseSink + 'static,
    {
        let capture_id = Uuid::new_v4();
        info!(%capture_id, "received new capture stream");

        // Receive the start request.
        let first = match source.recv().await {
            Ok(Some(request)) => request,
            Ok(None) => {
                return close_with(
                    sink,
                    Status::unknown("unable to receive message: client went away"),
                )
                .await;
            }
            Err(err) => {
                return close_with(
                    sink,
                    Status::unknown(format!("unable to receive message: {err}")),
                )
                .await;
            }
        };

        // Validate.
        let (target_request, options) = match validate_start(&first) {
            Ok((target_request, options)) => (target_request.clone(), options.clone()),
            Err(err) => return close_with(sink, Status::invalid_argument(err.to_string())).await,
        };

        // Tenant feature gate.
        let variant = target_request.variant();
        if !self.policy.enabled(variant) {
            return close_with(
                sink,
                Status::failed_precondition(format!(
                    "capturing from {variant} targets is not supported"
                )),
            )
            .await;
        }

        // Authorize.
        if let Err(denial) = self
            .verifier
            .verify(target_request.token(), &target_request)
            .await
        {
            return close_with(sink, Status::permission_denied(denial.to_string())).await;
        }

        // Resolve targets.
        let targets = match self.resolver.resolve(&target_request).await {
            Err(err) => return close_with(sink, Status::failed_precondition(err.to_string())).await,
            Ok(targets) if targets.is_empty() => {
                return close_with(sink, Status::failed_precondition("no targets")).await;
            }
            Ok(targets) => targets,
        };
        info!(%capture_id, targets = targets.len(), "starting capture sessions");

        // Establish all sessions concurrently. Individual failures are not
        // fatal yet; they become in-band FAILED_TO_START messages below.
        let results = future::join_all(targets.iter().map(|target| {
            session::establish(&self.dialer, target, &options, self.establish_timeout)
        }))
        .await;

        // With no session at all there is nothing to merge; the failures
        // fold into the terminal status.
        if results.iter().all(Result::is_err) {
            let detail = results
                .iter()
                .filter_map(|result| result.as_ref().err())
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return close_with(
                sink,
                Status::failed_precondition(format!(
                    "no capture session could be established: {detail}"
                )),
            )
            .await;
        }

        let scope = CancelScope::new();
        let mut inputs = Vec::with_capacity(results.len());
        let mut session_tasks = Vec::new();
        for result in results {
            match result {
                Ok(established) => {
                    let (rx, handle) = established.run(scope.clone());
                    inputs.push(rx);
                    session_tasks.push(handle);
                }
                Err(err) => {
                    warn!(%capture_id, error = %err, "session failed to start");
                    let (tx, rx) = mpsc::channel(1);
                    let _ = tx
                        .send(CaptureResponse::message(
                            MessageKind::FailedToStart,
                            err.to_string(),
                        ))
                        .await;
                    inputs.push(rx);
                }
            }
        }

        // Fan in, forward, and watch for the client's stop.
        let (merged, merge_tasks) = merge(inputs);
        let forwarder = tokio::spawn(forward(merged, sink, self.buffer, scope.clone()));
        let watcher = watch_for_stop(source, scope.clone());

        // The forwarder returns once every session has terminated and its
        // output has drained; whatever ended the capture has recorded its
        // cause by then.
        let sink = match forwarder.await {
            Ok(sink) => sink,
            Err(err) => {
                error!(%capture_id, error = %err, "forwarding task failed");
                let status = Status::internal("forwarding task failed");
                scope.cancel(Some(status.clone()));
                let _ = future::join_all(session_tasks).await;
                let _ = future::join_all(merge_tasks).await;
                let _ = watcher.await;
                return status;
            }
        };

        // Graceful no-op unless something already recorded a cause; this
        // also releases a watcher still parked on the client read.
        scope.cancel(None);
        let _ = future::join_all(session_tasks).await;
        let _ = future::join_all(merge_tasks).await;
        let _ = watcher.await;

        let status = scope.cause().unwrap_or_else(Status::ok);
        if status.is_ok() {
            info!(%capture_id, "capture ended");
        } else {
            error!(%capture_id, %status, "capture ended unsuccessfully");
        }
        close_with(sink, status).await
    }
}

/// Deliver the terminal status and close the client stream. Delivery is
/// best-effort: a client that already went away cannot receive its trailer.
async fn close_with<S: ResponseSink>(mut sink: S, status: Status) -> Status {
    if let Err(err) = sink.close(&status).await {
        debug!(error = %err, "failed to deliver trailer");
    }
    status
}
