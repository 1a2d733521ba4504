//! Cancellation tokens for in-flight tasks

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A cloneable cancellation token
///
/// Triggering is one-way and idempotent; the first call wins and its reason
/// is the one observed by every waiter.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger cancellation without a reason
    pub fn cancel(&self) {
        self.trigger(None);
    }

    /// Trigger cancellation carrying a reason string
    pub fn cancel_with_reason(&self, reason: impl Into<String>) {
        self.trigger(Some(reason.into()));
    }

    fn trigger(&self, reason: Option<String>) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            *self.inner.reason.lock() = reason;
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }

    /// Resolve once the token is triggered
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_trigger_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        token.cancel_with_reason("first");
        token.cancel_with_reason("second");

        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
            waiter.reason()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel_with_reason("done waiting");

        let reason = handle.await.unwrap();
        assert_eq!(reason.as_deref(), Some("done waiting"));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_pretriggered() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
    }
}
