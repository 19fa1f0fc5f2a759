use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::platform::{ProviderError, Result};

/// Cooperative cancellation and deadline shared by one logical operation.
///
/// Clones share state: cancelling any clone cancels all of them. Every
/// network call takes a token, and the paginator checks it between pages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
    deadline: Option<Instant>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    /// A token that never fires on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that fires once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().child_with_deadline(Instant::now() + timeout)
    }

    /// A token sharing this token's cancel flag, with an extra deadline.
    ///
    /// The earlier of the two deadlines wins.
    #[must_use]
    pub fn child_with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        };
        Self {
            inner: Arc::clone(&self.inner),
            deadline: Some(deadline),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Whether the token was cancelled or its deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Return `Err(Cancelled)` if the token has fired.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ProviderError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once the token fires.
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before reading the flag so a concurrent cancel() is not lost.
        notified.as_mut().enable();
        if self.inner.cancelled.load(Ordering::Acquire) {
            return;
        }
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = &mut notified => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => notified.await,
        }
    }

    /// Run `fut` unless the token fires first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ProviderError::Cancelled),
            out = fut => out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(ProviderError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_after_timeout() {
        let token = CancelToken::with_timeout(Duration::from_secs(5));
        assert!(!token.is_cancelled());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn run_aborts_pending_future_at_deadline() {
        let token = CancelToken::with_timeout(Duration::from_secs(1));
        let result: Result<()> = token
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ProviderError::Cancelled)));
    }

    #[tokio::test]
    async fn run_aborts_when_cancelled_concurrently() {
        let token = CancelToken::new();
        let canceller = token.clone();
        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            canceller.cancel();
        });
        let result: Result<()> = token.run(std::future::pending()).await;
        handle.await.expect("canceller task");
        assert!(matches!(result, Err(ProviderError::Cancelled)));
    }

    #[test]
    fn child_keeps_earlier_deadline() {
        let now = Instant::now();
        let parent = CancelToken::new().child_with_deadline(now + Duration::from_secs(1));
        let child = parent.child_with_deadline(now + Duration::from_secs(10));
        assert_eq!(child.deadline, Some(now + Duration::from_secs(1)));
    }
}
