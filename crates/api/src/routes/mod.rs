//! HTTP route handlers and the shared response envelope.

pub mod catalog;
pub mod health;
pub mod inventory;
pub mod metrics;
pub mod orders;

use axum::Json;
use fulfillment::{CatalogService, OrderCoordinator, OrderLifecycle, StockLedger};
use serde::Serialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S, L> {
    pub catalog: CatalogService<S>,
    pub ledger: StockLedger<S>,
    pub coordinator: OrderCoordinator<S, L>,
    pub lifecycle: OrderLifecycle<S>,
}

/// Success body: `{"status": "success", "data": ..., "message": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn success<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        data,
        message: None,
    })
}

pub fn success_with<T: Serialize>(data: T, message: impl Into<String>) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        data,
        message: Some(message.into()),
    })
}

/// Parses a path segment into a typed id, rejecting malformed UUIDs.
pub(crate) fn parse_id<T>(
    raw: &str,
    parse: fn(&str) -> Result<T, uuid::Error>,
) -> Result<T, ApiError> {
    parse(raw).map_err(|_| ApiError::BadRequest(format!("Invalid id: {raw}")))
}
