//! N-to-1 fan-in of per-session response channels.

use dragnet_core::CaptureResponse;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capacity of the merged output channel. Kept minimal: real buffering is
/// the forwarder's job, and a deep channel here would only hide
/// backpressure.
const MERGED_CHANNEL_CAPACITY: usize = 1;

/// Merge `inputs` into one channel.
///
/// One forwarding task per input is the sole writer for that input, so
/// per-source ordering is preserved; cross-source ordering is whatever the
/// scheduler produces. The output closes exactly once, after every input
/// has closed and every forwarding task has finished. Nothing is dropped
/// here: if the consumer stalls, the merger exerts backpressure upstream.
pub(crate) fn merge(
    inputs: Vec<mpsc::Receiver<CaptureResponse>>,
) -> (mpsc::Receiver<CaptureResponse>, Vec<JoinHandle<()>>) {
    let (tx, rx) = mpsc::channel(MERGED_CHANNEL_CAPACITY);

    let handles = inputs
        .into_iter()
        .map(|mut input| {
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(response) = input.recv().await {
                    if tx.send(response).await.is_err() {
                        break;
                    }
                }
            })
        })
        .collect();

    (rx, handles)
}
