use std::time::Duration;

use async_trait::async_trait;
use common::{ProductId, WarehouseId};

use crate::Result;

/// Lease length used when none is configured.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Builds the lock key guarding one product's stock in one warehouse.
pub fn lock_key(warehouse_id: WarehouseId, product_id: ProductId) -> String {
    format!("lock:order:{warehouse_id}:{product_id}")
}

/// Expiring, non-blocking exclusive locks.
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Takes the key for `ttl`, or fails with `Busy` if it is held.
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Drops the key. Releasing a key that is not held is not an error.
    async fn release(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<T: LockManager + ?Sized> LockManager for std::sync::Arc<T> {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<()> {
        (**self).acquire(key, ttl).await
    }

    async fn release(&self, key: &str) -> Result<()> {
        (**self).release(key).await
    }
}
