//! The lock-set protocol guarding multi-item stock writes.
//!
//! A [`LockSet`] is acquired before the transaction opens and released after
//! it ends, on every path:
//!
//! 1. [`LockSet::acquire_all`] takes every key in sorted order or none.
//! 2. The caller opens a transaction and writes.
//! 3. [`LockSet::check_lease`] runs right before commit; a lease older than
//!    the TTL means another caller may already hold the keys.
//! 4. [`LockSet::release_all`] frees the keys. If the set is dropped without
//!    it (cancelled future, panic) the release is spawned on the runtime.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use lock::{LockError, LockManager};
use tokio::time::Instant;

use crate::error::{FulfillmentError, Result};

/// Keys held together under one lease.
pub struct LockSet<L: LockManager + 'static> {
    locks: Arc<L>,
    keys: Vec<String>,
    acquired_at: Instant,
    ttl: Duration,
}

impl<L: LockManager + 'static> LockSet<L> {
    /// Acquires every key or none.
    ///
    /// Keys are deduplicated and taken in sorted order. On the first busy
    /// key the keys already taken are released and `ResourceBusy` is
    /// returned; there is no retry.
    pub async fn acquire_all(
        locks: Arc<L>,
        keys: impl IntoIterator<Item = String>,
        ttl: Duration,
    ) -> Result<Self> {
        let mut wanted: Vec<String> = keys.into_iter().collect();
        wanted.sort();
        wanted.dedup();

        let mut set = Self {
            locks,
            keys: Vec::with_capacity(wanted.len()),
            acquired_at: Instant::now(),
            ttl,
        };

        for key in wanted {
            match set.locks.acquire(&key, ttl).await {
                Ok(()) => set.keys.push(key),
                Err(err) => {
                    if matches!(err, LockError::Busy { .. }) {
                        metrics::counter!("lock_conflicts_total").increment(1);
                        tracing::info!(key = %key, "lock busy, giving up");
                    }
                    set.release_all().await;
                    return Err(err.into());
                }
            }
        }

        tracing::debug!(keys = set.keys.len(), "locks acquired");
        Ok(set)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Fails with `LockExpired` once the lease has outlived the TTL.
    pub fn check_lease(&self) -> Result<()> {
        if self.acquired_at.elapsed() >= self.ttl {
            tracing::warn!(
                elapsed_ms = self.acquired_at.elapsed().as_millis() as u64,
                ttl_ms = self.ttl.as_millis() as u64,
                "lock lease expired before commit"
            );
            return Err(FulfillmentError::LockExpired);
        }
        Ok(())
    }

    /// Releases every held key. Failures are logged and never surfaced.
    pub async fn release_all(&mut self) {
        let keys = std::mem::take(&mut self.keys);
        release_keys(self.locks.as_ref(), &keys).await;
    }
}

async fn release_keys<L: LockManager + ?Sized>(locks: &L, keys: &[String]) {
    let results = join_all(keys.iter().map(|key| locks.release(key))).await;
    for (key, result) in keys.iter().zip(results) {
        if let Err(err) = result {
            tracing::warn!(key = %key, error = %err, "lock release failed");
        }
    }
}

impl<L: LockManager + 'static> Drop for LockSet<L> {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let keys = std::mem::take(&mut self.keys);
        let locks = self.locks.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(keys = keys.len(), "releasing dropped lock set");
                handle.spawn(async move {
                    release_keys(locks.as_ref(), &keys).await;
                });
            }
            Err(_) => {
                tracing::warn!(keys = ?keys, "no runtime to release locks; they expire with the TTL");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lock::InMemoryLockManager;

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_acquire_all_sorts_and_dedups() {
        let locks = Arc::new(InMemoryLockManager::new());

        let mut set = LockSet::acquire_all(
            locks.clone(),
            ["b".to_string(), "a".to_string(), "b".to_string()],
            TTL,
        )
        .await
        .unwrap();

        assert_eq!(set.keys(), ["a".to_string(), "b".to_string()]);
        assert_eq!(locks.held_count(), 2);

        set.release_all().await;
        assert_eq!(locks.held_count(), 0);
    }

    #[tokio::test]
    async fn test_busy_key_releases_partial_set() {
        let locks = Arc::new(InMemoryLockManager::new());
        locks.acquire("c", TTL).await.unwrap();

        let result = LockSet::acquire_all(
            locks.clone(),
            ["a".to_string(), "b".to_string(), "c".to_string()],
            TTL,
        )
        .await;

        assert!(matches!(result, Err(FulfillmentError::ResourceBusy { key }) if key == "c"));
        assert!(!locks.is_held("a"));
        assert!(!locks.is_held("b"));
        assert!(locks.is_held("c"));
    }

    #[tokio::test]
    async fn test_lease_expires_with_zero_ttl() {
        let locks = Arc::new(InMemoryLockManager::new());

        let set = LockSet::acquire_all(locks, ["a".to_string()], Duration::ZERO)
            .await
            .unwrap();

        assert!(matches!(set.check_lease(), Err(FulfillmentError::LockExpired)));
    }

    #[tokio::test]
    async fn test_fresh_lease_is_valid() {
        let locks = Arc::new(InMemoryLockManager::new());

        let set = LockSet::acquire_all(locks, ["a".to_string()], TTL)
            .await
            .unwrap();

        assert!(set.check_lease().is_ok());
    }

    #[tokio::test]
    async fn test_drop_releases_in_background() {
        let locks = Arc::new(InMemoryLockManager::new());

        {
            let _set = LockSet::acquire_all(locks.clone(), ["a".to_string()], TTL)
                .await
                .unwrap();
        }

        for _ in 0..10 {
            if !locks.is_held("a") {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!locks.is_held("a"));
    }
}
