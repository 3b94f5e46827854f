//! Persistence collaborator for the warehouse inventory system.
//!
//! [`InventoryStore`] covers plain reads and master-data writes;
//! [`StoreTransaction`] is the atomic scope in which stock, mutation and
//! order writes commit or roll back together.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use query::OrderQuery;
pub use store::{InventoryStore, StoreTransaction};
