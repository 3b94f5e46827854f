use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use common::{MutationId, OrderId, ProductId, StockId, WarehouseId};
use domain::{Order, OrderStatus, Product, Stock, StockMutation, StockView, Warehouse};
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};

use crate::{
    OrderQuery, Result, StoreError,
    store::{InventoryStore, StoreTransaction},
};

#[derive(Default)]
struct Tables {
    warehouses: HashMap<WarehouseId, Warehouse>,
    products: HashMap<ProductId, Product>,
    stocks: HashMap<StockId, Stock>,
    stock_keys: HashMap<(ProductId, WarehouseId), StockId>,
    mutations: Vec<StockMutation>,
    orders: HashMap<OrderId, Order>,
}

impl Tables {
    fn stock_view(&self, stock: &Stock) -> Option<StockView> {
        let product = self.products.get(&stock.product_id)?;
        let warehouse = self.warehouses.get(&stock.warehouse_id)?;
        Some(StockView {
            stock_id: stock.id,
            quantity: stock.quantity,
            low_stock_threshold: stock.low_stock_threshold,
            low_stock: stock.is_low(),
            product_id: product.id,
            product_sku: product.sku.clone(),
            product_name: product.name.clone(),
            product_price: product.price,
            warehouse_id: warehouse.id,
            warehouse_code: warehouse.code.clone(),
            warehouse_name: warehouse.name.clone(),
            updated_at: stock.updated_at,
        })
    }
}

/// Identifies a row that a transaction can hold exclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Stock(ProductId, WarehouseId),
    Order(OrderId),
}

type RowLocks = Arc<Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>>;

/// Reverse of one write, replayed newest first on rollback.
#[derive(Debug)]
enum Undo {
    CreatedStock(StockId),
    StockDelta { stock_id: StockId, delta: i64 },
    InsertedMutation(MutationId),
    InsertedOrder(OrderId),
    OrderStatus(Box<Order>),
}

fn lock_tables(tables: &Mutex<Tables>) -> MutexGuard<'_, Tables> {
    tables.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory store implementation for tests and single-node runs.
///
/// Transactions write through to the shared tables and keep an undo log.
/// Stock and order rows are locked per transaction the way
/// `SELECT ... FOR UPDATE` would, so uncommitted deltas are only ever
/// reverted by the transaction that wrote them. Readers outside a
/// transaction may observe uncommitted values.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    row_locks: RowLocks,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stock mutation records.
    pub fn mutation_count(&self) -> usize {
        lock_tables(&self.tables).mutations.len()
    }

    /// Returns the total number of orders stored.
    pub fn order_count(&self) -> usize {
        lock_tables(&self.tables).orders.len()
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(InMemoryTransaction {
            tables: self.tables.clone(),
            row_locks: self.row_locks.clone(),
            undo: Vec::new(),
            held_rows: HashMap::new(),
            finished: false,
        })
    }

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<()> {
        let mut tables = lock_tables(&self.tables);
        if tables.warehouses.values().any(|w| w.code == warehouse.code) {
            return Err(StoreError::duplicate("warehouses_code_key"));
        }
        tables.warehouses.insert(warehouse.id, warehouse.clone());
        Ok(())
    }

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>> {
        Ok(lock_tables(&self.tables).warehouses.get(&id).cloned())
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        let tables = lock_tables(&self.tables);
        let mut warehouses: Vec<_> = tables.warehouses.values().cloned().collect();
        warehouses.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(warehouses)
    }

    async fn update_warehouse(&self, warehouse: &Warehouse) -> Result<()> {
        let mut tables = lock_tables(&self.tables);
        match tables.warehouses.get_mut(&warehouse.id) {
            Some(existing) => {
                *existing = warehouse.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("Warehouse", warehouse.id)),
        }
    }

    async fn delete_warehouse(&self, id: WarehouseId) -> Result<bool> {
        let mut tables = lock_tables(&self.tables);
        if !tables.warehouses.contains_key(&id) {
            return Ok(false);
        }
        if tables.orders.values().any(|o| o.warehouse_id == id) {
            return Err(StoreError::ConstraintViolation(format!(
                "warehouse {id} is referenced by orders"
            )));
        }
        if tables.stocks.values().any(|s| s.warehouse_id == id) {
            return Err(StoreError::ConstraintViolation(format!(
                "warehouse {id} is referenced by stock records"
            )));
        }
        tables.warehouses.remove(&id);
        Ok(true)
    }

    async fn count_stocked_items(&self, id: WarehouseId) -> Result<u64> {
        let tables = lock_tables(&self.tables);
        Ok(tables
            .stocks
            .values()
            .filter(|s| s.warehouse_id == id && s.quantity > 0)
            .count() as u64)
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut tables = lock_tables(&self.tables);
        if tables.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::duplicate("products_sku_key"));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(lock_tables(&self.tables).products.get(&id).cloned())
    }

    async fn list_products(&self, include_deleted: bool) -> Result<Vec<Product>> {
        let tables = lock_tables(&self.tables);
        let mut products: Vec<_> = tables
            .products
            .values()
            .filter(|p| include_deleted || !p.is_deleted)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(products)
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut tables = lock_tables(&self.tables);
        match tables.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("Product", product.id)),
        }
    }

    async fn get_stock(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Option<Stock>> {
        let tables = lock_tables(&self.tables);
        Ok(tables
            .stock_keys
            .get(&(product_id, warehouse_id))
            .and_then(|id| tables.stocks.get(id))
            .cloned())
    }

    async fn stock_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<StockView>> {
        let tables = lock_tables(&self.tables);
        let mut views: Vec<_> = tables
            .stocks
            .values()
            .filter(|s| s.warehouse_id == warehouse_id)
            .filter_map(|s| tables.stock_view(s))
            .collect();
        views.sort_by(|a, b| a.product_sku.cmp(&b.product_sku));
        Ok(views)
    }

    async fn mutations_for_stock(&self, stock_id: StockId) -> Result<Vec<StockMutation>> {
        let tables = lock_tables(&self.tables);
        Ok(tables
            .mutations
            .iter()
            .filter(|m| m.stock_id == stock_id)
            .cloned()
            .collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(lock_tables(&self.tables).orders.get(&id).cloned())
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let tables = lock_tables(&self.tables);
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(orders.into_iter().skip(offset).take(limit).collect())
    }
}

/// Transaction handle for [`InMemoryStore`].
pub struct InMemoryTransaction {
    tables: Arc<Mutex<Tables>>,
    row_locks: RowLocks,
    undo: Vec<Undo>,
    held_rows: HashMap<RowKey, OwnedMutexGuard<()>>,
    finished: bool,
}

impl InMemoryTransaction {
    /// Waits for exclusive ownership of a row. Re-locking a held row is a no-op.
    async fn lock_row(&mut self, key: RowKey) {
        if self.held_rows.contains_key(&key) {
            return;
        }
        let row = {
            let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key).or_default().clone()
        };
        let guard = row.lock_owned().await;
        self.held_rows.insert(key, guard);
    }

    fn undo_all(&mut self) {
        let mut tables = lock_tables(&self.tables);
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::CreatedStock(stock_id) => {
                    let untouched = tables.stocks.get(&stock_id).is_some_and(|s| s.quantity == 0)
                        && !tables.mutations.iter().any(|m| m.stock_id == stock_id);
                    if untouched && let Some(stock) = tables.stocks.remove(&stock_id) {
                        tables
                            .stock_keys
                            .remove(&(stock.product_id, stock.warehouse_id));
                    }
                }
                Undo::StockDelta { stock_id, delta } => {
                    if let Some(stock) = tables.stocks.get_mut(&stock_id) {
                        stock.quantity -= delta;
                    }
                }
                Undo::InsertedMutation(mutation_id) => {
                    tables.mutations.retain(|m| m.id != mutation_id);
                }
                Undo::InsertedOrder(order_id) => {
                    tables.orders.remove(&order_id);
                }
                Undo::OrderStatus(previous) => {
                    tables.orders.insert(previous.id, *previous);
                }
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        if self.held_rows.is_empty() {
            return;
        }
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        for key in self.held_rows.keys() {
            // Held only by the map and our guard: nobody is waiting on it.
            if locks.get(key).is_some_and(|row| Arc::strong_count(row) == 2) {
                locks.remove(key);
            }
        }
        drop(locks);
        self.held_rows.clear();
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            if !self.undo.is_empty() {
                tracing::debug!(writes = self.undo.len(), "rolling back dropped transaction");
            }
            self.undo_all();
            self.finish();
        }
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(lock_tables(&self.tables).products.get(&id).cloned())
    }

    async fn get_warehouse(&mut self, id: WarehouseId) -> Result<Option<Warehouse>> {
        Ok(lock_tables(&self.tables).warehouses.get(&id).cloned())
    }

    async fn lock_or_create_stock(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Stock> {
        self.lock_row(RowKey::Stock(product_id, warehouse_id)).await;

        let mut tables = lock_tables(&self.tables);
        if let Some(stock_id) = tables.stock_keys.get(&(product_id, warehouse_id)).copied() {
            return tables
                .stocks
                .get(&stock_id)
                .cloned()
                .ok_or_else(|| StoreError::Corrupt(format!("dangling stock key {stock_id}")));
        }

        if !tables.products.contains_key(&product_id) {
            return Err(StoreError::ConstraintViolation(format!(
                "stock references unknown product {product_id}"
            )));
        }
        if !tables.warehouses.contains_key(&warehouse_id) {
            return Err(StoreError::ConstraintViolation(format!(
                "stock references unknown warehouse {warehouse_id}"
            )));
        }

        let stock = Stock::empty(product_id, warehouse_id);
        tables.stocks.insert(stock.id, stock.clone());
        tables
            .stock_keys
            .insert((product_id, warehouse_id), stock.id);
        self.undo.push(Undo::CreatedStock(stock.id));
        Ok(stock)
    }

    async fn apply_stock_delta(&mut self, stock_id: StockId, delta: i64) -> Result<Stock> {
        let key = {
            let tables = lock_tables(&self.tables);
            let stock = tables
                .stocks
                .get(&stock_id)
                .ok_or_else(|| StoreError::not_found("Stock", stock_id))?;
            RowKey::Stock(stock.product_id, stock.warehouse_id)
        };
        self.lock_row(key).await;

        let mut tables = lock_tables(&self.tables);
        let stock = tables
            .stocks
            .get_mut(&stock_id)
            .ok_or_else(|| StoreError::not_found("Stock", stock_id))?;
        let quantity = stock
            .quantity
            .checked_add(delta)
            .filter(|q| *q >= 0)
            .ok_or_else(|| {
                StoreError::ConstraintViolation(format!(
                    "stock {stock_id} quantity {} cannot change by {delta}",
                    stock.quantity
                ))
            })?;
        stock.quantity = quantity;
        stock.updated_at = Utc::now();
        let updated = stock.clone();
        self.undo.push(Undo::StockDelta { stock_id, delta });
        Ok(updated)
    }

    async fn insert_mutation(&mut self, mutation: &StockMutation) -> Result<()> {
        let mut tables = lock_tables(&self.tables);
        if !tables.stocks.contains_key(&mutation.stock_id) {
            return Err(StoreError::ConstraintViolation(format!(
                "mutation references unknown stock {}",
                mutation.stock_id
            )));
        }
        tables.mutations.push(mutation.clone());
        self.undo.push(Undo::InsertedMutation(mutation.id));
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let mut tables = lock_tables(&self.tables);
        if tables
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(StoreError::duplicate("orders_order_number_key"));
        }
        tables.orders.insert(order.id, order.clone());
        self.undo.push(Undo::InsertedOrder(order.id));
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.lock_row(RowKey::Order(id)).await;
        Ok(lock_tables(&self.tables).orders.get(&id).cloned())
    }

    async fn update_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        cancel_reason: Option<&str>,
    ) -> Result<Order> {
        self.lock_row(RowKey::Order(id)).await;

        let mut tables = lock_tables(&self.tables);
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;
        let previous = order.clone();
        order.status = status;
        if let Some(reason) = cancel_reason {
            order.cancel_reason = Some(reason.to_string());
        }
        order.updated_at = Utc::now();
        let updated = order.clone();
        self.undo.push(Undo::OrderStatus(Box::new(previous)));
        Ok(updated)
    }

    async fn commit(mut self) -> Result<()> {
        self.undo.clear();
        self.finish();
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.undo_all();
        self.finish();
        Ok(())
    }
}
