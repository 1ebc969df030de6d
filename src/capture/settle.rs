//! Single-settlement guard.
//!
//! A worker and a deadline race to resolve the same result. Whichever calls
//! first wins; every later call is a no-op. The guard is a shared
//! `Option<oneshot::Sender>` that is `take()`n exactly once.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

// ============================================================================
// SettleOnce
// ============================================================================

/// Resolves a receiver at most once.
pub struct SettleOnce<T> {
    slot: Arc<Mutex<Option<oneshot::Sender<T>>>>,
}

impl<T> Clone for SettleOnce<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> SettleOnce<T> {
    /// Creates a guard and the receiver it resolves.
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let guard = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (guard, rx)
    }

    /// Delivers `value` if nobody settled first.
    ///
    /// Returns `true` if this call won.
    pub fn settle(&self, value: T) -> bool {
        match self.slot.lock().take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Settles without a value, closing the receiver.
    ///
    /// Returns `true` if this call won.
    pub fn cancel(&self) -> bool {
        self.slot.lock().take().is_some()
    }

    /// Returns `true` once any party has settled.
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.slot.lock().is_none()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_settle_wins() {
        let (guard, rx) = SettleOnce::new();
        let other = guard.clone();

        assert!(guard.settle(1));
        assert!(!other.settle(2));
        assert!(other.is_settled());
        assert_eq!(rx.await.expect("value"), 1);
    }

    #[tokio::test]
    async fn test_cancel_blocks_late_value() {
        let (guard, rx) = SettleOnce::<u8>::new();
        assert!(guard.cancel());
        assert!(!guard.settle(9));
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_settle_from_blocking_worker() {
        let (guard, rx) = SettleOnce::new();
        let worker = guard.clone();
        tokio::task::spawn_blocking(move || worker.settle("done"))
            .await
            .expect("join");
        assert_eq!(rx.await.expect("value"), "done");
    }
}
