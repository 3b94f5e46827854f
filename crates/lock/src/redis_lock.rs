use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::instrument;

use crate::{LockError, LockManager, Result};

/// Value stored under a held key.
const LOCKED: &str = "LOCKED";

/// Redis-backed lock manager using `SET key LOCKED NX EX ttl` and `DEL key`.
#[derive(Clone)]
pub struct RedisLockManager {
    conn: ConnectionManager,
}

impl RedisLockManager {
    /// Wraps an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Opens a managed connection to the given Redis URL.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

/// Whole seconds for `EX`, rounded up so the key never expires before the
/// caller's lease does. Redis rejects a zero expiry.
fn expiry_secs(ttl: Duration) -> u64 {
    (ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)).max(1)
}

#[async_trait]
impl LockManager for RedisLockManager {
    #[instrument(skip(self))]
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let seconds = expiry_secs(ttl);

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(LOCKED)
            .arg("NX")
            .arg("EX")
            .arg(seconds)
            .query_async(&mut conn)
            .await?;

        match reply {
            Some(_) => Ok(()),
            None => Err(LockError::Busy {
                key: key.to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn release(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }
}
