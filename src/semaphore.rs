//! Rate Gate: a counting semaphore whose acquisition can be interrupted
//! by task cancellation (§5, §9 "Semaphores must offer both a blocking
//! and a context-cancellable acquire").
//!
//! Built on `tokio::sync::Semaphore`; the cancellable variant races the
//! acquire future against a `CancellationToken` so a waiter parked on a
//! full gate unblocks immediately when its task is cancelled, without
//! ever taking a permit.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore as TokioSemaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Semaphore {
    inner: Arc<TokioSemaphore>,
}

impl Semaphore {
    pub fn new(capacity: usize) -> Self {
        Self { inner: Arc::new(TokioSemaphore::new(capacity)) }
    }

    /// Blocks until a permit is available or `cancel` fires, whichever
    /// comes first. Returns `None` on cancellation without having taken
    /// a permit.
    pub async fn acquire_cancellable(&self, cancel: &CancellationToken) -> Option<SemaphorePermit<'_>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = self.inner.acquire() => permit.ok(),
        }
    }

    /// Same as [`Self::acquire_cancellable`] but returns a permit with no
    /// borrow on `self`, for use by callers that spawn a `'static` task
    /// while holding the permit (e.g. `JoinSet::spawn`).
    pub async fn acquire_owned_cancellable(&self, cancel: &CancellationToken) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = self.inner.clone().acquire_owned() => permit.ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn acquire_blocks_until_release() {
        let sem = Semaphore::new(1);
        let cancel = CancellationToken::new();
        let permit = sem.acquire_cancellable(&cancel).await.expect("permit available");
        drop(permit);
        let _permit2 = sem.acquire_cancellable(&cancel).await.expect("permit available again");
    }

    #[tokio::test]
    async fn cancelled_waiter_unblocks_without_permit() {
        let sem = Semaphore::new(1);
        let cancel0 = CancellationToken::new();
        let _held = sem.acquire_cancellable(&cancel0).await.expect("permit available");
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel2.cancel();
        });
        let result = sem.acquire_cancellable(&cancel).await;
        assert!(result.is_none());
    }
}
