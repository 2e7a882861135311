//! Forwarding the merged stream to the client under a bounded buffer policy.

use dragnet_core::{CaptureResponse, MessageKind, Status};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::scope::CancelScope;
use crate::stream::ResponseSink;

/// Bounded-buffer policy between the merger and the client writer.
///
/// Invariant (checked by the configuration layer):
/// `lower_limit < upper_limit <= size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPolicy {
    /// Queue depth between the merger and the client writer.
    pub size: usize,
    /// Depth at which new packets start being dropped.
    pub upper_limit: usize,
    /// Depth below which packet delivery is considered recovered.
    pub lower_limit: usize,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            size: 100,
            upper_limit: 95,
            lower_limit: 60,
        }
    }
}

/// Pump the merged channel into the client sink.
///
/// A bounded queue separates the pump from the writer. When the queue depth
/// crosses `upper_limit`, new packets are dropped and one `CONGESTED`
/// message is enqueued; when it drains below `lower_limit`, one `RESUMED`
/// message ends the episode. Control messages are never dropped.
///
/// If the client write fails, the scope is cancelled with the underlying
/// cause and the queue keeps draining so sessions can finish stopping.
///
/// Returns the sink once the merged channel has closed and the queue has
/// drained, so the caller can deliver the terminal status.
pub(crate) async fn forward<S: ResponseSink + 'static>(
    mut merged: mpsc::Receiver<CaptureResponse>,
    sink: S,
    policy: BufferPolicy,
    scope: CancelScope,
) -> S {
    let (queue_tx, queue_rx) = mpsc::channel::<CaptureResponse>(policy.size);
    let writer = tokio::spawn(write_loop(queue_rx, sink, scope));

    let mut congested = false;
    while let Some(response) = merged.recv().await {
        let depth = policy.size - queue_tx.capacity();

        if congested && depth < policy.lower_limit {
            congested = false;
            let _ = queue_tx
                .send(CaptureResponse::message(
                    MessageKind::Resumed,
                    "packet delivery resumed",
                ))
                .await;
        }

        if response.is_packet() && depth >= policy.upper_limit {
            if !congested {
                congested = true;
                debug!(depth, "client too slow, dropping packets");
                let _ = queue_tx
                    .send(CaptureResponse::message(
                        MessageKind::Congested,
                        "client is not keeping up, dropping packets",
                    ))
                    .await;
            }
            continue;
        }

        let _ = queue_tx.send(response).await;
    }
    drop(queue_tx);

    writer.await.expect("forward writer task panicked")
}

/// Drain the queue into the sink. On a write failure the scope is cancelled
/// with the cause and the rest of the queue is discarded, never blocking the
/// pump.
async fn write_loop<S: ResponseSink>(
    mut queue: mpsc::Receiver<CaptureResponse>,
    mut sink: S,
    scope: CancelScope,
) -> S {
    let mut failed = false;
    while let Some(response) = queue.recv().await {
        if failed {
            continue;
        }
        if let Err(err) = sink.send(response).await {
            warn!(error = %err, "writing to client failed, cancelling capture");
            scope.cancel(Some(Status::unknown(format!("forward to client: {err}"))));
            failed = true;
        }
    }
    sink
}
