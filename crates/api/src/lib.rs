//! HTTP API server for the warehouse inventory and order backend.
//!
//! Exposes master data, stock adjustment and order endpoints over the
//! fulfillment services, with structured logging (tracing) and Prometheus
//! metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, patch, post};
use fulfillment::{CatalogService, OrderCoordinator, OrderLifecycle, StockLedger};
use lock::LockManager;
use metrics_exporter_prometheus::PrometheusHandle;
use store::InventoryStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, L>(state: Arc<AppState<S, L>>, metrics_handle: PrometheusHandle) -> Router
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    use routes::{catalog, inventory, orders};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/inventory/warehouses",
            post(catalog::create_warehouse::<S, L>).get(catalog::list_warehouses::<S, L>),
        )
        .route(
            "/inventory/warehouses/{id}",
            get(catalog::get_warehouse::<S, L>)
                .patch(catalog::update_warehouse::<S, L>)
                .delete(catalog::delete_warehouse::<S, L>),
        )
        .route(
            "/inventory/products",
            post(catalog::create_product::<S, L>).get(catalog::list_products::<S, L>),
        )
        .route(
            "/inventory/products/{id}",
            get(catalog::get_product::<S, L>)
                .patch(catalog::update_product::<S, L>)
                .delete(catalog::delete_product::<S, L>),
        )
        .route("/inventory/adjust", post(inventory::adjust::<S, L>))
        .route(
            "/inventory/stock/{id}",
            get(inventory::stock_by_warehouse::<S, L>),
        )
        .route(
            "/inventory/stock/{id}/mutations",
            get(inventory::mutations::<S, L>),
        )
        .route(
            "/orders",
            post(orders::create::<S, L>).get(orders::list::<S, L>),
        )
        .route("/orders/{id}", get(orders::get::<S, L>))
        .route("/orders/{id}/cancel", patch(orders::cancel::<S, L>))
        .route("/orders/{id}/status", patch(orders::update_status::<S, L>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the services over one store and one lock manager.
pub fn create_default_state<S, L>(
    store: S,
    locks: Arc<L>,
    lock_ttl: Duration,
) -> Arc<AppState<S, L>>
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    Arc::new(AppState {
        catalog: CatalogService::new(store.clone()),
        ledger: StockLedger::new(store.clone()),
        coordinator: OrderCoordinator::new(store.clone(), locks).with_lock_ttl(lock_ttl),
        lifecycle: OrderLifecycle::new(store),
    })
}
