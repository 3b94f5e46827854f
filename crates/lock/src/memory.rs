use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{LockError, LockManager, Result};

/// In-process lock manager for tests and single-node runs.
///
/// Keeps key → expiry; an entry past its expiry counts as absent, the same
/// way Redis drops a key whose `EX` has elapsed.
#[derive(Debug, Default)]
pub struct InMemoryLockManager {
    held: Mutex<HashMap<String, Instant>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the key is currently held and not expired.
    pub fn is_held(&self, key: &str) -> bool {
        let held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.get(key).is_some_and(|expiry| *expiry > Instant::now())
    }

    /// Number of live (unexpired) keys.
    pub fn held_count(&self) -> usize {
        let held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        held.values().filter(|expiry| **expiry > now).count()
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        if held.get(key).is_some_and(|expiry| *expiry > now) {
            tracing::debug!(key, "lock busy");
            return Err(LockError::Busy {
                key: key.to_string(),
            });
        }

        held.insert(key.to_string(), now + ttl);
        Ok(())
    }

    async fn release(&self, key: &str) -> Result<()> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_acquire_then_busy() {
        let locks = InMemoryLockManager::new();

        locks.acquire("lock:order:a:b", TTL).await.unwrap();
        let second = locks.acquire("lock:order:a:b", TTL).await;

        match second {
            Err(LockError::Busy { key }) => assert_eq!(key, "lock:order:a:b"),
            other => panic!("expected Busy, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_release_frees_key() {
        let locks = InMemoryLockManager::new();

        locks.acquire("k", TTL).await.unwrap();
        locks.release("k").await.unwrap();

        assert!(!locks.is_held("k"));
        locks.acquire("k", TTL).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let locks = InMemoryLockManager::new();

        locks.release("never-taken").await.unwrap();
        locks.acquire("k", TTL).await.unwrap();
        locks.release("k").await.unwrap();
        locks.release("k").await.unwrap();

        assert_eq!(locks.held_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_key_can_be_reacquired() {
        let locks = InMemoryLockManager::new();

        locks.acquire("k", Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        assert!(!locks.is_held("k"));
        locks.acquire("k", TTL).await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_are_independent() {
        let locks = InMemoryLockManager::new();

        locks.acquire("a", TTL).await.unwrap();
        locks.acquire("b", TTL).await.unwrap();

        assert_eq!(locks.held_count(), 2);
    }

    #[tokio::test]
    async fn test_only_one_concurrent_winner() {
        let locks = Arc::new(InMemoryLockManager::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let locks = locks.clone();
                tokio::spawn(async move { locks.acquire("hot", TTL).await.is_ok() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
    }
}
