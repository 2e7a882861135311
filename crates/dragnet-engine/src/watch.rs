//! The stop watcher: one concurrent reader of the client-to-server
//! direction after the initial start request.

use dragnet_core::{RequestPayload, Status};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::scope::CancelScope;
use crate::stream::RequestSource;

/// Read exactly one message from the client and cancel the scope with the
/// appropriate cause.
///
/// A valid stop cancels gracefully; everything else (disconnect, transport
/// error, malformed payload) carries a typed cause. If some other task
/// cancels the scope first, the watcher just ends: repeated or late stops
/// have no further effect.
pub(crate) fn watch_for_stop<S: RequestSource + 'static>(
    mut source: S,
    scope: CancelScope,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let received = tokio::select! {
            () = scope.cancelled() => return,
            received = source.recv() => received,
        };

        match received {
            Err(err) => scope.cancel(Some(Status::unknown(format!("read message: {err}")))),
            Ok(None) => scope.cancel(Some(Status::unknown("read message: client went away"))),
            Ok(Some(request)) => match request.payload {
                None => scope.cancel(Some(Status::invalid_argument(
                    "read message: message or payload: NIL_FIELD",
                ))),
                Some(RequestPayload::Stop) => {
                    debug!("client requested stop of capture");
                    scope.cancel(None);
                }
                Some(RequestPayload::Start(_)) => scope.cancel(Some(Status::invalid_argument(
                    "read payload: expected stop payload: INVALID_PAYLOAD",
                ))),
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dragnet_core::{CaptureOptions, CaptureRequest, Code, TargetRequest};
    use dragnet_wire::{WireError, WireResult};

    /// Source scripted with a single outcome.
    enum Scripted {
        Message(CaptureRequest),
        Eof,
        Error,
        Pending,
    }

    #[async_trait]
    impl RequestSource for Scripted {
        async fn recv(&mut self) -> WireResult<Option<CaptureRequest>> {
            match self {
                Self::Message(request) => Ok(Some(request.clone())),
                Self::Eof => Ok(None),
                Self::Error => Err(WireError::Io(std::io::Error::from(
                    std::io::ErrorKind::ConnectionReset,
                ))),
                Self::Pending => std::future::pending().await,
            }
        }
    }

    fn start_request() -> CaptureRequest {
        CaptureRequest::start(
            TargetRequest::Vm {
                token: "t".into(),
                deployment: "cf".into(),
                groups: vec!["router".into()],
            },
            CaptureOptions {
                device: "en0".into(),
                filter: String::new(),
                snap_len: 65_000,
            },
        )
    }

    #[tokio::test]
    async fn test_valid_stop_cancels_gracefully() {
        let scope = CancelScope::new();
        watch_for_stop(Scripted::Message(CaptureRequest::stop()), scope.clone())
            .await
            .unwrap();

        assert!(scope.is_cancelled());
        assert!(scope.cause().is_none());
    }

    #[tokio::test]
    async fn test_eof_cancels_with_unknown() {
        let scope = CancelScope::new();
        watch_for_stop(Scripted::Eof, scope.clone()).await.unwrap();

        let cause = scope.cause().unwrap();
        assert_eq!(cause.code, Code::Unknown);
        assert!(cause.message.starts_with("read message"), "{cause}");
    }

    #[tokio::test]
    async fn test_transport_error_cancels_with_unknown() {
        let scope = CancelScope::new();
        watch_for_stop(Scripted::Error, scope.clone())
            .await
            .unwrap();

        let cause = scope.cause().unwrap();
        assert_eq!(cause.code, Code::Unknown);
    }

    #[tokio::test]
    async fn test_missing_payload_is_invalid_argument() {
        let scope = CancelScope::new();
        watch_for_stop(Scripted::Message(CaptureRequest::default()), scope.clone())
            .await
            .unwrap();

        let cause = scope.cause().unwrap();
        assert_eq!(cause.code, Code::InvalidArgument);
        assert!(cause.message.contains("NIL_FIELD"), "{cause}");
    }

    #[tokio::test]
    async fn test_second_start_is_invalid_payload() {
        let scope = CancelScope::new();
        watch_for_stop(Scripted::Message(start_request()), scope.clone())
            .await
            .unwrap();

        let cause = scope.cause().unwrap();
        assert_eq!(cause.code, Code::InvalidArgument);
        assert!(cause.message.contains("INVALID_PAYLOAD"), "{cause}");
    }

    #[tokio::test]
    async fn test_watcher_ends_when_scope_cancelled_elsewhere() {
        let scope = CancelScope::new();
        let handle = watch_for_stop(Scripted::Pending, scope.clone());

        scope.cancel(None);
        handle.await.unwrap();
        assert!(scope.cause().is_none());
    }
}
