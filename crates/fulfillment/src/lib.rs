//! Stock and order services for the warehouse inventory system.
//!
//! - [`StockLedger`] applies audited stock adjustments.
//! - [`OrderCoordinator`] places orders: it locks every (warehouse, product)
//!   pair, deducts stock for each line and stores the order in one
//!   transaction, then releases the locks.
//! - [`OrderLifecycle`] moves orders through their status machine and
//!   restores stock on cancellation.
//! - [`CatalogService`] manages warehouses and products.

pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod protocol;

#[cfg(test)]
mod testing;

pub use catalog::CatalogService;
pub use coordinator::{CreateOrder, OrderCoordinator, OrderItemRequest};
pub use error::{FulfillmentError, Result};
pub use ledger::{AdjustStock, StockLedger};
pub use lifecycle::OrderLifecycle;
pub use protocol::LockSet;
