//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::UserId;
use lock::{DEFAULT_LOCK_TTL, InMemoryLockManager, LockManager, lock_key};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

/// A caller identity as the gateway would forward it.
#[derive(Clone)]
struct Caller {
    user_id: UserId,
    role: &'static str,
    permissions: &'static str,
}

impl Caller {
    fn admin() -> Self {
        Self {
            user_id: UserId::new(),
            role: "admin",
            permissions: "all",
        }
    }

    fn staff(permissions: &'static str) -> Self {
        Self {
            user_id: UserId::new(),
            role: "staff",
            permissions,
        }
    }
}

struct TestApp {
    router: axum::Router,
    locks: Arc<InMemoryLockManager>,
}

impl TestApp {
    fn new() -> Self {
        let locks = Arc::new(InMemoryLockManager::new());
        let state = api::create_default_state(InMemoryStore::new(), locks.clone(), DEFAULT_LOCK_TTL);
        let router = api::create_app(state, get_metrics_handle());
        Self { router, locks }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        caller: Option<&Caller>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder
                .header("x-user-id", caller.user_id.to_string())
                .header("x-user-role", caller.role)
                .header("x-user-permissions", caller.permissions);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn warehouse(&self, code: &str) -> String {
        let (status, json) = self
            .send(
                "POST",
                "/inventory/warehouses",
                Some(&Caller::admin()),
                Some(json!({
                    "code": code,
                    "name": "Gudang Jakarta",
                    "address": "Jl. Daan Mogot, Jakarta Barat",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"]["id"].as_str().unwrap().to_string()
    }

    async fn product(&self, sku: &str, price: i64) -> String {
        let (status, json) = self
            .send(
                "POST",
                "/inventory/products",
                Some(&Caller::admin()),
                Some(json!({
                    "sku": sku,
                    "name": "Laptop ASUS ROG",
                    "price": price,
                    "tags": ["electronics"],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"]["id"].as_str().unwrap().to_string()
    }

    async fn stock_in(&self, product_id: &str, warehouse_id: &str, quantity: i64) -> Value {
        let (status, json) = self
            .send(
                "POST",
                "/inventory/adjust",
                Some(&Caller::admin()),
                Some(json!({
                    "product_id": product_id,
                    "warehouse_id": warehouse_id,
                    "quantity": quantity,
                    "type": "IN",
                    "reason": "PURCHASE",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        json["data"].clone()
    }

    async fn stock_of(&self, warehouse_id: &str, product_id: &str) -> i64 {
        let (status, json) = self
            .send(
                "GET",
                &format!("/inventory/stock/{warehouse_id}"),
                Some(&Caller::admin()),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        json["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|v| v["product_id"] == product_id)
            .map(|v| v["quantity"].as_i64().unwrap())
            .unwrap_or(0)
    }
}

fn order_body(warehouse_id: &str, items: &[(&str, i64)]) -> Value {
    json!({
        "warehouse_id": warehouse_id,
        "customer_name": "Sultan Buyer",
        "items": items
            .iter()
            .map(|(product_id, quantity)| json!({ "product_id": product_id, "quantity": quantity }))
            .collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let (status, json) = app.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = TestApp::new();

    let (status, json) = app.send("GET", "/inventory/warehouses", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn test_missing_permission_is_forbidden() {
    let app = TestApp::new();
    let viewer = Caller::staff("inventory.view");

    let (status, _) = app
        .send(
            "POST",
            "/inventory/warehouses",
            Some(&viewer),
            Some(json!({ "code": "WH-01", "name": "Gudang", "address": "Jakarta" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("GET", "/inventory/warehouses", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_warehouse_code_conflicts() {
    let app = TestApp::new();
    app.warehouse("wh-jkt").await;

    let (status, json) = app
        .send(
            "POST",
            "/inventory/warehouses",
            Some(&Caller::admin()),
            Some(json!({ "code": "WH-JKT", "name": "Gudang Lain", "address": "Jakarta Utara" })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Duplicate key: Warehouse code already exists");
}

#[tokio::test]
async fn test_adjust_and_read_mutations() {
    let app = TestApp::new();
    let warehouse_id = app.warehouse("WH-JKT").await;
    let product_id = app.product("LAPTOP-001", 25_000_000).await;

    let stock = app.stock_in(&product_id, &warehouse_id, 10).await;
    assert_eq!(stock["quantity"], 10);

    let stock_id = stock["id"].as_str().unwrap();
    let (status, json) = app
        .send(
            "GET",
            &format!("/inventory/stock/{stock_id}/mutations"),
            Some(&Caller::admin()),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let log = json["data"].as_array().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["type"], "IN");
    assert_eq!(log[0]["reason"], "PURCHASE");
}

#[tokio::test]
async fn test_adjust_rejects_non_positive_quantity() {
    let app = TestApp::new();
    let warehouse_id = app.warehouse("WH-JKT").await;
    let product_id = app.product("LAPTOP-001", 100).await;

    let (status, _) = app
        .send(
            "POST",
            "/inventory/adjust",
            Some(&Caller::admin()),
            Some(json!({
                "product_id": product_id,
                "warehouse_id": warehouse_id,
                "quantity": -3,
                "type": "IN",
                "reason": "PURCHASE",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_order_deducts_stock() {
    let app = TestApp::new();
    let warehouse_id = app.warehouse("WH-JKT").await;
    let laptop = app.product("LAPTOP-001", 25_000_000).await;
    let mouse = app.product("MOUSE-001", 150_000).await;
    app.stock_in(&laptop, &warehouse_id, 5).await;
    app.stock_in(&mouse, &warehouse_id, 10).await;
    let buyer = Caller::staff("order.create,order.view");

    let (status, json) = app
        .send(
            "POST",
            "/orders",
            Some(&buyer),
            Some(order_body(&warehouse_id, &[(&laptop, 2), (&mouse, 3)])),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["status"], "PENDING");
    assert_eq!(json["data"]["total_amount"], 50_450_000);
    assert!(
        json["data"]["order_number"]
            .as_str()
            .unwrap()
            .starts_with("ORD-")
    );
    assert_eq!(app.stock_of(&warehouse_id, &laptop).await, 3);
    assert_eq!(app.stock_of(&warehouse_id, &mouse).await, 7);
}

#[tokio::test]
async fn test_insufficient_stock_is_bad_request() {
    let app = TestApp::new();
    let warehouse_id = app.warehouse("WH-JKT").await;
    let laptop = app.product("LAPTOP-001", 25_000_000).await;
    app.stock_in(&laptop, &warehouse_id, 1).await;

    let (status, json) = app
        .send(
            "POST",
            "/orders",
            Some(&Caller::admin()),
            Some(order_body(&warehouse_id, &[(&laptop, 2)])),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Insufficient stock. Current: 1, requested: 2");
    assert_eq!(app.stock_of(&warehouse_id, &laptop).await, 1);
}

#[tokio::test]
async fn test_held_lock_is_conflict() {
    let app = TestApp::new();
    let warehouse_id = app.warehouse("WH-JKT").await;
    let laptop = app.product("LAPTOP-001", 25_000_000).await;
    app.stock_in(&laptop, &warehouse_id, 5).await;

    let key = lock_key(
        common::WarehouseId::parse(&warehouse_id).unwrap(),
        common::ProductId::parse(&laptop).unwrap(),
    );
    app.locks.acquire(&key, DEFAULT_LOCK_TTL).await.unwrap();

    let (status, _) = app
        .send(
            "POST",
            "/orders",
            Some(&Caller::admin()),
            Some(order_body(&warehouse_id, &[(&laptop, 1)])),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.stock_of(&warehouse_id, &laptop).await, 5);
}

#[tokio::test]
async fn test_cancel_restores_stock() {
    let app = TestApp::new();
    let warehouse_id = app.warehouse("WH-JKT").await;
    let laptop = app.product("LAPTOP-001", 25_000_000).await;
    app.stock_in(&laptop, &warehouse_id, 5).await;
    let buyer = Caller::staff("order.create,order.view");

    let (_, json) = app
        .send(
            "POST",
            "/orders",
            Some(&buyer),
            Some(order_body(&warehouse_id, &[(&laptop, 2)])),
        )
        .await;
    let order_id = json["data"]["id"].as_str().unwrap().to_string();

    let (status, json) = app
        .send(
            "PATCH",
            &format!("/orders/{order_id}/cancel"),
            Some(&buyer),
            Some(json!({ "reason": "changed my mind" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["status"], "CANCELLED");
    assert_eq!(json["data"]["cancel_reason"], "changed my mind");
    assert_eq!(app.stock_of(&warehouse_id, &laptop).await, 5);

    let (status, _) = app
        .send(
            "PATCH",
            &format!("/orders/{order_id}/cancel"),
            Some(&buyer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_status_updates_follow_state_machine() {
    let app = TestApp::new();
    let warehouse_id = app.warehouse("WH-JKT").await;
    let laptop = app.product("LAPTOP-001", 25_000_000).await;
    app.stock_in(&laptop, &warehouse_id, 5).await;
    let manager = Caller {
        user_id: UserId::new(),
        role: "manager",
        permissions: "order.view,order.create,order.manage",
    };

    let (_, json) = app
        .send(
            "POST",
            "/orders",
            Some(&manager),
            Some(order_body(&warehouse_id, &[(&laptop, 1)])),
        )
        .await;
    let order_id = json["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/orders/{order_id}/status");

    let (status, _) = app
        .send("PATCH", &uri, Some(&manager), Some(json!({ "status": "SHIPPED" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = app
        .send("PATCH", &uri, Some(&manager), Some(json!({ "status": "PROCESSED" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "PROCESSED");

    let staff = Caller::staff("order.view");
    let (status, _) = app
        .send("PATCH", &uri, Some(&staff), Some(json!({ "status": "SHIPPED" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_staff_only_see_their_own_orders() {
    let app = TestApp::new();
    let warehouse_id = app.warehouse("WH-JKT").await;
    let laptop = app.product("LAPTOP-001", 25_000_000).await;
    app.stock_in(&laptop, &warehouse_id, 5).await;
    let alice = Caller::staff("order.create,order.view");
    let bob = Caller::staff("order.create,order.view");

    let (_, json) = app
        .send(
            "POST",
            "/orders",
            Some(&alice),
            Some(order_body(&warehouse_id, &[(&laptop, 1)])),
        )
        .await;
    let order_id = json["data"]["id"].as_str().unwrap().to_string();

    let (status, json) = app.send("GET", "/orders", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"].as_array().unwrap().is_empty());

    let (status, json) = app.send("GET", "/orders", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .send("GET", &format!("/orders/{order_id}"), Some(&bob), None)
        .await;
    assert_ne!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_warehouse_with_stock_is_refused() {
    let app = TestApp::new();
    let warehouse_id = app.warehouse("WH-JKT").await;
    let laptop = app.product("LAPTOP-001", 100).await;
    app.stock_in(&laptop, &warehouse_id, 1).await;

    let (status, json) = app
        .send(
            "DELETE",
            &format!("/inventory/warehouses/{warehouse_id}"),
            Some(&Caller::admin()),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Validation error: Cannot delete warehouse with active stock");
}

#[tokio::test]
async fn test_invalid_id_is_bad_request() {
    let app = TestApp::new();

    let (status, _) = app
        .send("GET", "/orders/not-a-uuid", Some(&Caller::admin()), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new();

    let (status, _) = app.send("GET", "/metrics", None, None).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_product_update_and_soft_delete() {
    let app = TestApp::new();
    let product_id = app.product("LAPTOP-001", 100).await;
    let uri = format!("/inventory/products/{product_id}");

    let (status, json) = app
        .send("PATCH", &uri, Some(&Caller::admin()), Some(json!({ "price": 250 })))
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["price"], 250);
    assert_eq!(json["data"]["sku"], "LAPTOP-001");

    let (status, _) = app.send("DELETE", &uri, Some(&Caller::admin()), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("GET", &uri, Some(&Caller::admin()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = app
        .send("GET", "/inventory/products", Some(&Caller::admin()), None)
        .await;
    assert!(json["data"].as_array().unwrap().is_empty());

    let (_, json) = app
        .send(
            "GET",
            "/inventory/products?include_deleted=true",
            Some(&Caller::admin()),
            None,
        )
        .await;
    assert_eq!(json["data"][0]["is_deleted"], true);
}

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let app = TestApp::new();
    let caller = Caller::admin();

    let request = Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .header("x-user-id", caller.user_id.to_string())
        .header("x-user-role", caller.role)
        .header("x-user-permissions", caller.permissions)
        .body(Body::from("{\"warehouse_id\": "))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "error");
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_unknown_status_uses_error_envelope() {
    let app = TestApp::new();

    let (status, json) = app
        .send("GET", "/orders?status=LOST", Some(&Caller::admin()), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");

    let uri = format!("/orders/{}/status", common::OrderId::new());
    let (status, json) = app
        .send("PATCH", &uri, Some(&Caller::admin()), Some(json!({ "status": "LOST" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
}
