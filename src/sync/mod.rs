pub mod engine;
pub mod loader;
pub mod retry;

pub use engine::SyncEngine;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Cooperative cancellation for in-flight runs. Checked between pages and
/// chunks: cancellation stops new fetch/load calls promptly and counts as a
/// failed run, so the checkpoint is never advanced past cancelled work.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // notify_one leaves a permit if nothing is waiting yet
        self.notify.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolve once the flag has been set.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_resolves_waiters() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());

        let waiter = flag.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        flag.cancel();
        handle.await.unwrap();
        assert!(flag.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_after_the_fact_returns_immediately() {
        let flag = CancelFlag::new();
        flag.cancel();
        flag.cancelled().await;
    }
}
