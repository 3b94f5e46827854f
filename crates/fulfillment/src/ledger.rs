//! Stock ledger: audited quantity changes.

use chrono::Utc;
use common::{MutationId, ProductId, StockId, UserId, WarehouseId};
use domain::{Direction, MutationReason, Stock, StockMutation, StockView};
use store::{InventoryStore, StoreTransaction};
use tracing::instrument;

use crate::error::{FulfillmentError, Result};

/// One requested stock change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustStock {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: u32,
    pub direction: Direction,
    pub reason: MutationReason,
    pub performed_by: UserId,
    pub notes: Option<String>,
    pub reference_id: Option<String>,
}

/// Applies stock changes and records each one in the mutation log.
///
/// Every successful [`adjust`](StockLedger::adjust) writes the new quantity
/// and exactly one [`StockMutation`] in the same transaction.
#[derive(Clone)]
pub struct StockLedger<S> {
    store: S,
}

impl<S: InventoryStore> StockLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Applies one adjustment.
    ///
    /// With `tx` the change joins the caller's transaction and is neither
    /// committed nor rolled back here. Without it the ledger opens its own
    /// transaction, commits on success and rolls back on failure.
    #[instrument(
        skip_all,
        fields(
            product_id = %cmd.product_id,
            warehouse_id = %cmd.warehouse_id,
            direction = %cmd.direction,
            quantity = cmd.quantity,
        )
    )]
    pub async fn adjust(&self, cmd: AdjustStock, tx: Option<&mut S::Tx>) -> Result<Stock> {
        if let Some(tx) = tx {
            return apply_adjustment(tx, &cmd).await;
        }

        let mut tx = self.store.begin().await?;
        match apply_adjustment(&mut tx, &cmd).await {
            Ok(stock) => {
                tx.commit().await?;
                tracing::info!(stock_id = %stock.id, quantity = stock.quantity, "stock adjusted");
                Ok(stock)
            }
            Err(err) => {
                rollback_logged(tx).await;
                Err(err)
            }
        }
    }

    /// Stock of one warehouse with product and warehouse display fields.
    #[instrument(skip(self))]
    pub async fn stock_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<StockView>> {
        if self.store.get_warehouse(warehouse_id).await?.is_none() {
            return Err(FulfillmentError::not_found("Warehouse", warehouse_id));
        }
        Ok(self.store.stock_by_warehouse(warehouse_id).await?)
    }

    /// The audit trail of one stock record, oldest first.
    #[instrument(skip(self))]
    pub async fn mutations_for_stock(&self, stock_id: StockId) -> Result<Vec<StockMutation>> {
        Ok(self.store.mutations_for_stock(stock_id).await?)
    }
}

async fn apply_adjustment<T: StoreTransaction>(tx: &mut T, cmd: &AdjustStock) -> Result<Stock> {
    if cmd.quantity == 0 {
        return Err(FulfillmentError::Validation(
            "quantity must be greater than 0".to_string(),
        ));
    }

    tx.get_product(cmd.product_id)
        .await?
        .filter(|p| p.is_active())
        .ok_or_else(|| FulfillmentError::not_found("Product", cmd.product_id))?;
    tx.get_warehouse(cmd.warehouse_id)
        .await?
        .ok_or_else(|| FulfillmentError::not_found("Warehouse", cmd.warehouse_id))?;

    let stock = tx
        .lock_or_create_stock(cmd.product_id, cmd.warehouse_id)
        .await?;
    let delta = stock.delta_for(cmd.direction, cmd.quantity)?;
    let updated = tx.apply_stock_delta(stock.id, delta).await?;

    tx.insert_mutation(&StockMutation {
        id: MutationId::new(),
        stock_id: updated.id,
        direction: cmd.direction,
        quantity: cmd.quantity,
        reason: cmd.reason,
        notes: cmd.notes.clone(),
        reference_id: cmd.reference_id.clone(),
        performed_by: cmd.performed_by,
        created_at: Utc::now(),
    })
    .await?;

    metrics::counter!("stock_adjustments_total", "direction" => cmd.direction.as_str())
        .increment(1);
    Ok(updated)
}

/// Rolls back, logging instead of surfacing a rollback failure so the
/// original error reaches the caller.
pub(crate) async fn rollback_logged<T: StoreTransaction>(tx: T) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "transaction rollback failed");
    }
}
