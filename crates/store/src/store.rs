use async_trait::async_trait;
use common::{OrderId, ProductId, StockId, WarehouseId};
use domain::{Order, OrderStatus, Product, Stock, StockMutation, StockView, Warehouse};

use crate::{OrderQuery, Result};

/// Core trait for inventory persistence backends.
///
/// Methods on the store itself run outside any transaction. Every write that
/// must be atomic with another goes through a [`StoreTransaction`] obtained
/// from [`InventoryStore::begin`]. All implementations must be thread-safe.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// The transaction type handed out by [`InventoryStore::begin`].
    type Tx: StoreTransaction + 'static;

    /// Starts a new atomic scope.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Inserts a warehouse. Fails with `DuplicateKey` on a taken code.
    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<()>;

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>>;

    /// Lists warehouses ordered by code.
    async fn list_warehouses(&self) -> Result<Vec<Warehouse>>;

    /// Overwrites the mutable fields of a warehouse. Fails with `NotFound`.
    async fn update_warehouse(&self, warehouse: &Warehouse) -> Result<()>;

    /// Deletes a warehouse, returning false if it did not exist.
    ///
    /// Fails with `ConstraintViolation` while any stock record or order
    /// references it, whatever the stock quantity.
    async fn delete_warehouse(&self, id: WarehouseId) -> Result<bool>;

    /// Counts stock records in a warehouse holding a positive quantity.
    async fn count_stocked_items(&self, id: WarehouseId) -> Result<u64>;

    /// Inserts a product. Fails with `DuplicateKey` on a taken SKU.
    async fn insert_product(&self, product: &Product) -> Result<()>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products ordered by SKU, optionally including soft-deleted ones.
    async fn list_products(&self, include_deleted: bool) -> Result<Vec<Product>>;

    /// Overwrites the mutable fields of a product. Fails with `NotFound`.
    async fn update_product(&self, product: &Product) -> Result<()>;

    /// Reads a stock record without locking it.
    async fn get_stock(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Option<Stock>>;

    /// Stock in a warehouse joined with product and warehouse display fields,
    /// ordered by product SKU.
    async fn stock_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<StockView>>;

    /// The audit trail of one stock record, oldest first.
    async fn mutations_for_stock(&self, stock_id: StockId) -> Result<Vec<StockMutation>>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders matching the query, newest first.
    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>>;
}

/// An atomic unit of work.
///
/// Writes become durable only on [`commit`](StoreTransaction::commit).
/// Dropping a transaction without committing rolls it back, so an early
/// return, an error or a panic never leaves a partial write behind.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    async fn get_warehouse(&mut self, id: WarehouseId) -> Result<Option<Warehouse>>;

    /// Loads the stock record for a pair, creating it at quantity 0 when
    /// absent. The row stays locked against other transactions until this
    /// one ends, where the backend supports row locks.
    async fn lock_or_create_stock(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Stock>;

    /// Adds a signed delta to a stock quantity and returns the updated record.
    ///
    /// Fails with `ConstraintViolation` if the result would be negative.
    async fn apply_stock_delta(&mut self, stock_id: StockId, delta: i64) -> Result<Stock>;

    /// Appends an audit record.
    async fn insert_mutation(&mut self, mutation: &StockMutation) -> Result<()>;

    /// Inserts an order. Fails with `DuplicateKey` on a taken order number.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Loads an order and locks it against concurrent status changes.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Sets the status (and optional cancellation reason) of an order,
    /// returning the updated order. Fails with `NotFound`.
    async fn update_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        cancel_reason: Option<&str>,
    ) -> Result<Order>;

    /// Makes every write in this transaction durable.
    async fn commit(self) -> Result<()>;

    /// Discards every write in this transaction.
    async fn rollback(self) -> Result<()>;
}
