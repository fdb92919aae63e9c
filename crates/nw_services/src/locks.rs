use dashmap::DashMap;
use nw_core::UserId;
use std::sync::Arc;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per (user, keyword) pair.
///
/// Search and refresh hold the guard from the keyword lookup until the new batch is
/// written, so two requests for the same pair never interleave. Different pairs never
/// contend.
#[derive(Clone, Default)]
pub struct KeywordLocks {
    inner: Arc<DashMap<(UserId, String), Arc<TokioMutex<()>>>>,
}

impl KeywordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user: UserId, keyword: &str) -> OwnedMutexGuard<()> {
        if self.inner.len() >= PRUNE_THRESHOLD {
            self.prune();
        }
        let lock = self.inner.entry((user, keyword.to_string())).or_default().clone();
        lock.lock_owned().await
    }

    /// Drop entries nobody holds or waits on
    pub fn prune(&self) {
        self.inner.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_pair_is_serialized() {
        let locks = KeywordLocks::new();
        let guard = locks.acquire(1, "rust").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(1, "rust").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_pairs_do_not_contend() {
        let locks = KeywordLocks::new();
        let _rust = locks.acquire(1, "rust").await;
        let _go = tokio::time::timeout(Duration::from_millis(100), locks.acquire(1, "go"))
            .await
            .unwrap();
        let _other_user = tokio::time::timeout(Duration::from_millis(100), locks.acquire(2, "rust"))
            .await
            .unwrap();
        assert_eq!(locks.len(), 3);
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = KeywordLocks::new();
        let held = locks.acquire(1, "rust").await;
        drop(locks.acquire(1, "go").await);

        locks.prune();
        assert_eq!(locks.len(), 1);

        drop(held);
        locks.prune();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_idle_entries_pruned_past_threshold() {
        let locks = KeywordLocks::new();
        for i in 0..PRUNE_THRESHOLD {
            drop(locks.acquire(1, &format!("kw{}", i)).await);
        }
        assert_eq!(locks.len(), PRUNE_THRESHOLD);

        let _held = locks.acquire(2, "rust").await;
        assert_eq!(locks.len(), 1);
    }
}
