//! Cancellation scope with an at-most-once cause.

use std::sync::{Arc, OnceLock};

use dragnet_core::Status;
use tokio_util::sync::CancellationToken;

/// A cancellable lifetime shared by all tasks of one capture stream.
///
/// Cancellation carries a *cause*: `None` for a graceful client stop, or a
/// [`Status`] explaining why the capture ended. The cause slot is written at
/// most once (first writer wins); later cancellations are no-ops for the
/// cause and idempotent for the token.
#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    token: CancellationToken,
    cause: Arc<OnceLock<Option<Status>>>,
}

impl CancelScope {
    /// Create a fresh, uncancelled scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the scope, recording `cause` if no cause was recorded yet.
    pub fn cancel(&self, cause: Option<Status>) {
        let _ = self.cause.set(cause);
        self.token.cancel();
    }

    /// Resolves once the scope has been cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Whether the scope has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The recorded cause, if cancellation was non-graceful.
    #[must_use]
    pub fn cause(&self) -> Option<Status> {
        self.cause.get().cloned().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dragnet_core::Code;

    #[test]
    fn test_first_cause_wins() {
        let scope = CancelScope::new();
        scope.cancel(Some(Status::unknown("first")));
        scope.cancel(Some(Status::invalid_argument("second")));

        let cause = scope.cause().unwrap();
        assert_eq!(cause.code, Code::Unknown);
        assert_eq!(cause.message, "first");
    }

    #[test]
    fn test_graceful_cancel_has_no_cause() {
        let scope = CancelScope::new();
        scope.cancel(None);
        assert!(scope.is_cancelled());
        assert!(scope.cause().is_none());

        // A later error cannot replace the graceful cause.
        scope.cancel(Some(Status::unknown("late")));
        assert!(scope.cause().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_for_all_clones() {
        let scope = CancelScope::new();
        let observer = scope.clone();

        let waiter = tokio::spawn(async move {
            observer.cancelled().await;
        });
        scope.cancel(None);
        waiter.await.unwrap();
    }
}
