//! Cooperative cancellation for a run
//!
//! A `CancelSignal` is created per run and cloned into every stage and
//! connection task. Stages poll it between samples; in-flight requests are
//! raced against it so cancelling drops (and closes) the HTTP call.

use crate::error::{AppError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct CancelSignal {
    own: Arc<watch::Sender<bool>>,
    parent: Option<Arc<watch::Sender<bool>>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            own: Arc::new(tx),
            parent: None,
        }
    }

    /// A signal that fires when either it or `self` is cancelled.
    /// Cancelling the child leaves `self` untouched.
    pub fn child(&self) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            own: Arc::new(tx),
            parent: Some(Arc::clone(&self.own)),
        }
    }

    /// Fire the signal. Returns false if it was already cancelled.
    pub fn cancel(&self) -> bool {
        !self.own.send_replace(true)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.own.borrow() || self.parent.as_ref().is_some_and(|p| *p.borrow())
    }

    /// `Err(Cancelled)` once the signal has fired
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AppError::cancelled("speed test cancelled"))
        } else {
            Ok(())
        }
    }

    /// Resolves when the signal fires
    pub async fn cancelled(&self) {
        match &self.parent {
            Some(parent) => {
                tokio::select! {
                    _ = wait_for_true(&self.own) => {}
                    _ = wait_for_true(parent) => {}
                }
            }
            None => wait_for_true(&self.own).await,
        }
    }

    /// Race `future` against the signal, dropping it on cancellation
    pub async fn run_or_cancel<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(AppError::cancelled("speed test cancelled")),
            result = future => result,
        }
    }

    /// Sleep that ends early with `Err(Cancelled)`
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            return self.check();
        }
        self.run_or_cancel(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_true(sender: &watch::Sender<bool>) {
    let mut rx = sender.subscribe();
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone: the signal can never fire
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_is_observed() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());
        assert!(signal.check().is_ok());

        assert!(signal.cancel());
        assert!(!signal.cancel());
        assert!(signal.is_cancelled());
        assert!(signal.check().unwrap_err().is_cancellation());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        signal.cancel();
        assert!(clone.is_cancelled());
        clone.cancelled().await;
    }

    #[tokio::test]
    async fn test_child_follows_parent_but_not_back() {
        let parent = CancelSignal::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
        other.cancelled().await;
    }

    #[tokio::test]
    async fn test_run_or_cancel_drops_pending_future() {
        let signal = CancelSignal::new();
        let waiter = signal.clone();

        let task = tokio::spawn(async move {
            waiter
                .run_or_cancel(async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(42)
                })
                .await
        });

        tokio::task::yield_now().await;
        signal.cancel();
        let result = task.await.unwrap();
        assert!(result.unwrap_err().is_cancellation());
    }

    #[tokio::test]
    async fn test_run_or_cancel_passes_result_through() {
        let signal = CancelSignal::new();
        let value = signal.run_or_cancel(async { Ok::<_, AppError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_or_cancels() {
        let signal = CancelSignal::new();
        assert!(signal.sleep(Duration::from_millis(200)).await.is_ok());

        signal.cancel();
        assert!(signal.sleep(Duration::from_millis(200)).await.is_err());
        assert!(signal.sleep(Duration::ZERO).await.is_err());
    }
}
