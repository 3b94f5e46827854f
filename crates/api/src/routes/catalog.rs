//! Warehouse and product master data endpoints.
//!
//! Reads need `inventory.view`, writes need `inventory.manage`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::{ProductId, WarehouseId};
use domain::{NewProduct, NewWarehouse, Permission, ProductPatch, WarehousePatch};
use lock::LockManager;
use serde::Deserialize;
use store::InventoryStore;

use super::{AppState, parse_id, success, success_with};
use crate::auth::{Authenticated, require};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};

const READ: &[Permission] = &[Permission::InventoryView, Permission::InventoryManage];
const WRITE: &[Permission] = &[Permission::InventoryManage];

#[derive(Debug, Default, Deserialize)]
pub struct ListProductsParams {
    #[serde(default)]
    pub include_deleted: bool,
}

// -- Warehouses --

pub async fn create_warehouse<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    ApiJson(req): ApiJson<NewWarehouse>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, WRITE)?;
    let warehouse = state.catalog.create_warehouse(req).await?;
    Ok((
        StatusCode::CREATED,
        success_with(warehouse, "Warehouse created successfully"),
    ))
}

pub async fn list_warehouses<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, READ)?;
    Ok(success(state.catalog.list_warehouses().await?))
}

pub async fn get_warehouse<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, READ)?;
    let id = parse_id(&id, WarehouseId::parse)?;
    Ok(success(state.catalog.get_warehouse(id).await?))
}

pub async fn update_warehouse<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<WarehousePatch>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, WRITE)?;
    let id = parse_id(&id, WarehouseId::parse)?;
    let warehouse = state.catalog.update_warehouse(id, patch).await?;
    Ok(success_with(warehouse, "Warehouse updated successfully"))
}

/// Refused while the warehouse still holds stock.
pub async fn delete_warehouse<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, WRITE)?;
    let id = parse_id(&id, WarehouseId::parse)?;
    state.catalog.delete_warehouse(id).await?;
    Ok(success_with(
        serde_json::Value::Null,
        "Warehouse deleted successfully",
    ))
}

// -- Products --

pub async fn create_product<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    ApiJson(req): ApiJson<NewProduct>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, WRITE)?;
    let product = state.catalog.create_product(req).await?;
    Ok((
        StatusCode::CREATED,
        success_with(product, "Product created successfully"),
    ))
}

pub async fn list_products<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    ApiQuery(params): ApiQuery<ListProductsParams>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, READ)?;
    Ok(success(
        state.catalog.list_products(params.include_deleted).await?,
    ))
}

pub async fn get_product<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, READ)?;
    let id = parse_id(&id, ProductId::parse)?;
    Ok(success(state.catalog.get_product(id).await?))
}

pub async fn update_product<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, WRITE)?;
    let id = parse_id(&id, ProductId::parse)?;
    let product = state.catalog.update_product(id, patch).await?;
    Ok(success_with(product, "Product updated successfully"))
}

/// Soft delete; existing order snapshots keep the product's details.
pub async fn delete_product<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    require(&principal, WRITE)?;
    let id = parse_id(&id, ProductId::parse)?;
    state.catalog.delete_product(id).await?;
    Ok(success_with(
        serde_json::Value::Null,
        "Product deleted successfully",
    ))
}
