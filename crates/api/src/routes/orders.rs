//! Order placement and lifecycle endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::{OrderId, WarehouseId};
use domain::{OrderStatus, Permission};
use fulfillment::CreateOrder;
use lock::LockManager;
use serde::Deserialize;
use store::{InventoryStore, OrderQuery};

use super::{AppState, parse_id, success, success_with};
use crate::auth::{Authenticated, require};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery, optional_json};

const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<OrderStatus>,
    pub warehouse_id: Option<WarehouseId>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListOrdersParams {
    fn into_query(self) -> OrderQuery {
        OrderQuery {
            created_by: None,
            warehouse_id: self.warehouse_id,
            status: self.status,
            limit: Some(self.limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)),
            offset: self.offset,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// POST /orders: places an order and deducts its stock.
pub async fn create<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    ApiJson(req): ApiJson<CreateOrder>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, &[Permission::OrderCreate])?;
    let order = state.coordinator.create_order(&principal, req).await?;
    Ok((
        StatusCode::CREATED,
        success_with(order, "Order created successfully"),
    ))
}

/// GET /orders: newest first. Staff without order management only see
/// their own orders.
pub async fn list<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    ApiQuery(params): ApiQuery<ListOrdersParams>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, &[Permission::OrderView])?;
    let orders = state
        .lifecycle
        .list_orders(&principal, params.into_query())
        .await?;
    Ok(success(orders))
}

/// GET /orders/{id}
pub async fn get<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, &[Permission::OrderView])?;
    let id = parse_id(&id, OrderId::parse)?;
    Ok(success(state.lifecycle.get_order(id, &principal).await?))
}

/// PATCH /orders/{id}/cancel: cancels and restores stock. The body is
/// optional.
pub async fn cancel<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, &[Permission::OrderView, Permission::OrderCreate])?;
    let id = parse_id(&id, OrderId::parse)?;
    let reason = optional_json::<CancelOrderRequest>(&body)?.and_then(|req| req.reason);

    let order = state.lifecycle.cancel(id, &principal, reason).await?;
    Ok(success_with(order, "Order cancelled successfully"))
}

/// PATCH /orders/{id}/status: advances an order one step.
pub async fn update_status<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, &[Permission::OrderManage])?;
    let id = parse_id(&id, OrderId::parse)?;

    let order = state
        .lifecycle
        .update_status(id, req.status, &principal)
        .await?;
    Ok(success_with(
        order,
        format!("Order status updated to {}", req.status),
    ))
}
