//! Shared identifier types for the warehouse inventory workspace.

mod types;

pub use types::{MutationId, OrderId, ProductId, StockId, UserId, WarehouseId};
