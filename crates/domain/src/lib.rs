//! Domain model for the warehouse inventory system.
//!
//! This crate provides the core domain types:
//! - Products and warehouses (master data)
//! - Stock records, directions, reasons and the mutation audit record
//! - Orders with line snapshots and the status state machine
//! - The authenticated principal with its role and permissions

pub mod catalog;
pub mod error;
pub mod money;
pub mod order;
pub mod principal;
pub mod stock;

pub use catalog::{
    NewProduct, NewWarehouse, Product, ProductPatch, Warehouse, WarehousePatch, normalize_code,
};
pub use error::DomainError;
pub use money::Money;
pub use order::{Order, OrderLine, OrderStatus, generate_order_number, total_of};
pub use principal::{Permission, Principal, Role};
pub use stock::{
    DEFAULT_LOW_STOCK_THRESHOLD, Direction, MutationReason, Stock, StockMutation, StockView,
};
