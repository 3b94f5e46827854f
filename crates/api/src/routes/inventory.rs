//! Stock adjustment and stock query endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use common::{ProductId, StockId, WarehouseId};
use domain::{Direction, MutationReason, Permission};
use fulfillment::AdjustStock;
use lock::LockManager;
use serde::Deserialize;
use store::InventoryStore;

use super::{AppState, parse_id, success, success_with};
use crate::auth::{Authenticated, require};
use crate::error::ApiError;
use crate::extract::ApiJson;

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    #[serde(rename = "type")]
    pub direction: Direction,
    pub reason: MutationReason,
    pub notes: Option<String>,
    pub reference_id: Option<String>,
}

/// POST /inventory/adjust: applies one audited stock change.
pub async fn adjust<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    ApiJson(req): ApiJson<AdjustStockRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, &[Permission::StockAdjust])?;

    let quantity = u32::try_from(req.quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| ApiError::BadRequest("quantity must be greater than 0".to_string()))?;

    let stock = state
        .ledger
        .adjust(
            AdjustStock {
                product_id: req.product_id,
                warehouse_id: req.warehouse_id,
                quantity,
                direction: req.direction,
                reason: req.reason,
                performed_by: principal.user_id,
                notes: req.notes,
                reference_id: req.reference_id,
            },
            None,
        )
        .await?;

    Ok(success_with(stock, "Stock adjusted successfully"))
}

/// GET /inventory/stock/{warehouse_id}: stock of one warehouse.
pub async fn stock_by_warehouse<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    Path(warehouse_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, &[Permission::InventoryView])?;
    let warehouse_id = parse_id(&warehouse_id, WarehouseId::parse)?;

    let stock = state.ledger.stock_by_warehouse(warehouse_id).await?;
    Ok(success(stock))
}

/// GET /inventory/stock/{stock_id}/mutations: audit trail of one stock record.
pub async fn mutations<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    Path(stock_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, &[Permission::InventoryView])?;
    let stock_id = parse_id(&stock_id, StockId::parse)?;

    let mutations = state.ledger.mutations_for_stock(stock_id).await?;
    Ok(success(mutations))
}
