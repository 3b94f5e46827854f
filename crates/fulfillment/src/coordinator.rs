//! Order fulfillment: turns a validated order request into committed stock
//! deductions and an order record, all or nothing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{ProductId, WarehouseId};
use domain::{
    Direction, MutationReason, Order, OrderLine, Principal, Product, generate_order_number,
};
use lock::{DEFAULT_LOCK_TTL, LockManager, lock_key};
use serde::Deserialize;
use store::{InventoryStore, StoreTransaction};

use crate::error::{FulfillmentError, Result};
use crate::ledger::{AdjustStock, StockLedger, rollback_logged};
use crate::protocol::LockSet;

/// Minimum customer name length after trimming.
const MIN_CUSTOMER_NAME_LEN: usize = 3;

/// One requested order line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Command to place an order against one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateOrder {
    pub warehouse_id: WarehouseId,
    pub customer_name: String,
    pub items: Vec<OrderItemRequest>,
}

impl CreateOrder {
    pub fn validate(&self) -> Result<()> {
        if self.customer_name.trim().chars().count() < MIN_CUSTOMER_NAME_LEN {
            return Err(FulfillmentError::Validation(format!(
                "customer_name must be at least {MIN_CUSTOMER_NAME_LEN} characters"
            )));
        }
        if self.items.is_empty() {
            return Err(FulfillmentError::Validation(
                "order must have at least 1 item".to_string(),
            ));
        }
        if self.items.iter().any(|item| item.quantity == 0) {
            return Err(FulfillmentError::Validation(
                "item quantity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Places orders under the lock-set protocol.
///
/// Concurrent orders touching the same (warehouse, product) pair are
/// serialized by the lock manager; the loser fails fast with
/// `ResourceBusy`. Disjoint orders proceed in parallel.
pub struct OrderCoordinator<S, L> {
    store: S,
    ledger: StockLedger<S>,
    locks: Arc<L>,
    lock_ttl: Duration,
}

impl<S, L> OrderCoordinator<S, L>
where
    S: InventoryStore + Clone,
    L: LockManager + 'static,
{
    pub fn new(store: S, locks: Arc<L>) -> Self {
        Self {
            ledger: StockLedger::new(store.clone()),
            store,
            locks,
            lock_ttl: DEFAULT_LOCK_TTL,
        }
    }

    /// Overrides the lock lease length.
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Creates an order, deducting stock for every line.
    ///
    /// On success every line's stock is reduced, one SALE mutation per line
    /// is recorded and the order is stored as `Pending`. On any failure none
    /// of that happens. Every acquired lock is released either way.
    #[tracing::instrument(
        skip_all,
        fields(
            user_id = %principal.user_id,
            warehouse_id = %cmd.warehouse_id,
            items = cmd.items.len(),
        )
    )]
    pub async fn create_order(&self, principal: &Principal, cmd: CreateOrder) -> Result<Order> {
        let start = Instant::now();
        let result = self.place(principal, cmd).await;
        metrics::histogram!("order_creation_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    total = %order.total_amount,
                    "order created"
                );
            }
            Err(err) => {
                metrics::counter!("orders_failed_total").increment(1);
                tracing::info!(error = %err, "order rejected");
            }
        }
        result
    }

    async fn place(&self, principal: &Principal, cmd: CreateOrder) -> Result<Order> {
        cmd.validate()?;
        if self.store.get_warehouse(cmd.warehouse_id).await?.is_none() {
            return Err(FulfillmentError::not_found("Warehouse", cmd.warehouse_id));
        }

        let keys = cmd
            .items
            .iter()
            .map(|item| lock_key(cmd.warehouse_id, item.product_id));
        let mut locks = LockSet::acquire_all(self.locks.clone(), keys, self.lock_ttl).await?;

        let result = self.fulfill(principal, &cmd, &locks).await;
        locks.release_all().await;
        result
    }

    async fn fulfill(
        &self,
        principal: &Principal,
        cmd: &CreateOrder,
        locks: &LockSet<L>,
    ) -> Result<Order> {
        let mut tx = self.store.begin().await?;

        let written = match self.write_order(&mut tx, principal, cmd).await {
            Ok(order) => locks.check_lease().map(|()| order),
            Err(err) => Err(err),
        };

        match written {
            Ok(order) => {
                tx.commit().await?;
                Ok(order)
            }
            Err(err) => {
                rollback_logged(tx).await;
                Err(err)
            }
        }
    }

    async fn write_order(
        &self,
        tx: &mut S::Tx,
        principal: &Principal,
        cmd: &CreateOrder,
    ) -> Result<Order> {
        let mut products: Vec<Product> = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            let product = tx
                .get_product(item.product_id)
                .await?
                .filter(Product::is_active)
                .ok_or_else(|| FulfillmentError::not_found("Product", item.product_id))?;
            products.push(product);
        }

        // Row locks in one global order so a concurrent cancellation
        // touching the same rows cannot deadlock with us.
        let mut pairs: Vec<ProductId> = cmd.items.iter().map(|item| item.product_id).collect();
        pairs.sort();
        pairs.dedup();
        for product_id in pairs {
            tx.lock_or_create_stock(product_id, cmd.warehouse_id).await?;
        }

        let customer_name = cmd.customer_name.trim().to_string();
        let order_number = generate_order_number();
        let notes = format!("Order processing for {customer_name}");

        let mut lines = Vec::with_capacity(cmd.items.len());
        for (item, product) in cmd.items.iter().zip(&products) {
            self.ledger
                .adjust(
                    AdjustStock {
                        product_id: item.product_id,
                        warehouse_id: cmd.warehouse_id,
                        quantity: item.quantity,
                        direction: Direction::Out,
                        reason: MutationReason::Sale,
                        performed_by: principal.user_id,
                        notes: Some(notes.clone()),
                        reference_id: Some(order_number.clone()),
                    },
                    Some(&mut *tx),
                )
                .await?;
            lines.push(OrderLine::snapshot(product, item.quantity));
        }

        let order = Order::place(
            order_number,
            customer_name,
            cmd.warehouse_id,
            principal.user_id,
            lines,
        )?;
        tx.insert_order(&order).await?;
        Ok(order)
    }
}
