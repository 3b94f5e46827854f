//! Distributed lock manager.
//!
//! A lock is a key with an expiry. [`LockManager::acquire`] either sets the
//! key or fails immediately with [`LockError::Busy`]; it never waits. The
//! expiry bounds how long a crashed holder can block a key.

pub mod error;
pub mod manager;
pub mod memory;
pub mod redis_lock;

pub use error::{LockError, Result};
pub use manager::{DEFAULT_LOCK_TTL, LockManager, lock_key};
pub use memory::InMemoryLockManager;
pub use redis_lock::RedisLockManager;
