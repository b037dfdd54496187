//! One-shot completion delivery for transfers
//!
//! A `CompletionHandler` wraps the caller's continuation together with the
//! runtime it must run on. Completion is always *posted* onto that
//! runtime, never invoked inline, even when the transfer resolves from
//! inside the call that started it. That way a continuation that
//! immediately starts or cancels more transfers re-enters the multiplexer
//! through its command channel instead of re-entering the table mutation
//! that resolved it.
//!
//! The handler carries no double-fire guard of its own: it can only be
//! completed by being consumed, and its owner (the multiplexer's transfer
//! table) hands it out exactly once.

use std::fmt;

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use flowmux_common::TransferOutcome;

/// A one-shot continuation plus the runtime it runs on
pub struct CompletionHandler {
    continuation: Box<dyn FnOnce(TransferOutcome) + Send + 'static>,
    executor: Handle,
}

impl CompletionHandler {
    /// Wrap a continuation, bound to the current runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime; use
    /// [`CompletionHandler::with_executor`] to bind explicitly.
    pub fn new<F>(continuation: F) -> Self
    where
        F: FnOnce(TransferOutcome) + Send + 'static,
    {
        Self::with_executor(Handle::current(), continuation)
    }

    /// Wrap a continuation, bound to an explicit runtime handle
    pub fn with_executor<F>(executor: Handle, continuation: F) -> Self
    where
        F: FnOnce(TransferOutcome) + Send + 'static,
    {
        Self {
            continuation: Box::new(continuation),
            executor,
        }
    }

    /// A handler that resolves a oneshot receiver
    ///
    /// Convenient for callers that want to await the outcome rather than
    /// run code in the continuation. Dropping the receiver is fine; the
    /// completion is then discarded.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<TransferOutcome>) {
        let (tx, rx) = oneshot::channel();
        let handler = Self::new(move |outcome| {
            let _ = tx.send(outcome);
        });
        (handler, rx)
    }

    /// Post the continuation with the transfer's outcome
    ///
    /// Consumes the handler; the owner calls this exactly once per
    /// transfer. The continuation runs on the handler's runtime on a
    /// later tick, never inside this call.
    pub(crate) fn complete(self, outcome: TransferOutcome) {
        let continuation = self.continuation;
        self.executor.spawn(async move {
            continuation(outcome);
        });
    }
}

impl fmt::Debug for CompletionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use flowmux_common::TransferStatus;

    #[tokio::test]
    async fn test_complete_delivers_outcome() {
        let (handler, rx) = CompletionHandler::channel();
        handler.complete(TransferOutcome::Cancelled);
        assert_eq!(rx.await.unwrap(), TransferOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_complete_is_posted_not_inline() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let handler = CompletionHandler::new(move |_| {
            flag.store(true, Ordering::SeqCst);
        });

        handler.complete(TransferOutcome::Aborted);
        // On a current-thread runtime nothing can have run yet: the
        // continuation was posted, not invoked.
        assert!(!fired.load(Ordering::SeqCst));

        tokio::task::yield_now().await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_explicit_executor() {
        let (tx, rx) = oneshot::channel();
        let handler = CompletionHandler::with_executor(Handle::current(), move |outcome| {
            let _ = tx.send(outcome);
        });
        handler.complete(TransferOutcome::Finished {
            status: TransferStatus::Ok,
        });
        let outcome = rx.await.unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_tolerated() {
        let (handler, rx) = CompletionHandler::channel();
        drop(rx);
        // Must not panic even though nobody is listening.
        handler.complete(TransferOutcome::Cancelled);
        tokio::task::yield_now().await;
    }
}
