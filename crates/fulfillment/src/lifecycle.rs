//! Order lifecycle: status changes and cancellation with stock restoration.

use std::collections::BTreeMap;

use common::{OrderId, ProductId};
use domain::{Order, OrderStatus, Principal};
use store::{InventoryStore, OrderQuery, StoreTransaction};
use tracing::instrument;

use crate::error::{FulfillmentError, Result};
use crate::ledger::rollback_logged;

/// Moves orders through their status machine.
///
/// Unlike order creation this path takes no distributed lock; the order row
/// lock inside the transaction serializes concurrent status changes.
#[derive(Clone)]
pub struct OrderLifecycle<S> {
    store: S,
}

impl<S: InventoryStore> OrderLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Cancels an order and puts every line's quantity back on its stock.
    ///
    /// Only the creator or order-managing staff may cancel. Shipped,
    /// delivered and already cancelled orders cannot be cancelled.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn cancel(
        &self,
        order_id: OrderId,
        principal: &Principal,
        reason: Option<String>,
    ) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        match cancel_in(&mut tx, order_id, principal, reason.as_deref()).await {
            Ok(order) => {
                tx.commit().await?;
                metrics::counter!("orders_cancelled_total").increment(1);
                tracing::info!(order_number = %order.order_number, "order cancelled");
                Ok(order)
            }
            Err(err) => {
                rollback_logged(tx).await;
                Err(err)
            }
        }
    }

    /// Advances an order one step along its status machine.
    ///
    /// A transition to `Cancelled` goes through [`cancel`](Self::cancel) so
    /// the stock is restored.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        principal: &Principal,
    ) -> Result<Order> {
        if !principal.can_manage_orders() {
            return Err(FulfillmentError::Forbidden(
                "Only order managers can change order status".to_string(),
            ));
        }
        if status == OrderStatus::Cancelled {
            return self.cancel(order_id, principal, None).await;
        }

        let mut tx = self.store.begin().await?;
        match advance_in(&mut tx, order_id, status).await {
            Ok(order) => {
                tx.commit().await?;
                tracing::info!(status = %order.status, "order status updated");
                Ok(order)
            }
            Err(err) => {
                rollback_logged(tx).await;
                Err(err)
            }
        }
    }

    /// Loads one order visible to the principal.
    #[instrument(skip(self, principal))]
    pub async fn get_order(&self, order_id: OrderId, principal: &Principal) -> Result<Order> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("Order", order_id))?;

        if !order.is_owned_by(principal.user_id) && !principal.can_manage_orders() {
            return Err(FulfillmentError::Forbidden(
                "You can only view your own orders".to_string(),
            ));
        }
        Ok(order)
    }

    /// Lists orders newest first. Callers who cannot manage orders only ever
    /// see their own, whatever the query says.
    #[instrument(skip(self, principal, query))]
    pub async fn list_orders(&self, principal: &Principal, query: OrderQuery) -> Result<Vec<Order>> {
        let query = if principal.can_manage_orders() {
            query
        } else {
            query.created_by(principal.user_id)
        };
        Ok(self.store.list_orders(&query).await?)
    }
}

async fn advance_in<T: StoreTransaction>(
    tx: &mut T,
    order_id: OrderId,
    status: OrderStatus,
) -> Result<Order> {
    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| FulfillmentError::not_found("Order", order_id))?;
    let next = order.status.transition_to(status)?;
    Ok(tx.update_order_status(order_id, next, None).await?)
}

async fn cancel_in<T: StoreTransaction>(
    tx: &mut T,
    order_id: OrderId,
    principal: &Principal,
    reason: Option<&str>,
) -> Result<Order> {
    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| FulfillmentError::not_found("Order", order_id))?;

    if !order.is_owned_by(principal.user_id) && !principal.can_manage_orders() {
        return Err(FulfillmentError::Forbidden(
            "You can only cancel your own orders".to_string(),
        ));
    }
    order.status.transition_to(OrderStatus::Cancelled)?;

    let cancelled = tx
        .update_order_status(order_id, OrderStatus::Cancelled, reason)
        .await?;

    // Sorted by product so row locks are taken in the same order as
    // order creation takes them.
    let mut restock: BTreeMap<ProductId, i64> = BTreeMap::new();
    for line in &order.items {
        *restock.entry(line.product_id).or_default() += i64::from(line.quantity);
    }
    for (product_id, quantity) in restock {
        let stock = tx
            .lock_or_create_stock(product_id, order.warehouse_id)
            .await?;
        tx.apply_stock_delta(stock.id, quantity).await?;
    }

    Ok(cancelled)
}
