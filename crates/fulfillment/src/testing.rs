//! Shared fixtures for unit tests.

use std::sync::Arc;

use common::{ProductId, UserId, WarehouseId};
use domain::{Direction, Money, MutationReason, NewProduct, NewWarehouse, Product, Warehouse};
use lock::InMemoryLockManager;
use store::{InMemoryStore, InventoryStore};

use crate::coordinator::{CreateOrder, OrderItemRequest};
use crate::ledger::{AdjustStock, StockLedger};
use crate::{OrderCoordinator, OrderLifecycle};

pub(crate) struct Fixture {
    pub store: InMemoryStore,
    pub locks: Arc<InMemoryLockManager>,
    pub ledger: StockLedger<InMemoryStore>,
    pub coordinator: OrderCoordinator<InMemoryStore, InMemoryLockManager>,
    pub lifecycle: OrderLifecycle<InMemoryStore>,
    pub warehouse: Warehouse,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = InMemoryStore::new();
        let locks = Arc::new(InMemoryLockManager::new());
        let warehouse = Warehouse::create(NewWarehouse {
            code: "WH-01".to_string(),
            name: "Gudang Pusat".to_string(),
            address: "Jl. Sudirman 1, Jakarta".to_string(),
            description: None,
        })
        .unwrap();
        store.insert_warehouse(&warehouse).await.unwrap();

        Self {
            ledger: StockLedger::new(store.clone()),
            coordinator: OrderCoordinator::new(store.clone(), locks.clone()),
            lifecycle: OrderLifecycle::new(store.clone()),
            store,
            locks,
            warehouse,
        }
    }

    pub async fn product(&self, sku: &str, price_cents: i64) -> Product {
        let product = Product::create(NewProduct {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            price: Money::from_cents(price_cents),
            ..Default::default()
        })
        .unwrap();
        self.store.insert_product(&product).await.unwrap();
        product
    }

    /// A product with `quantity` units received into the fixture warehouse.
    pub async fn stocked_product(&self, sku: &str, price_cents: i64, quantity: u32) -> Product {
        let product = self.product(sku, price_cents).await;
        self.ledger
            .adjust(adjust_in(product.id, self.warehouse.id, quantity), None)
            .await
            .unwrap();
        product
    }

    pub async fn quantity(&self, product_id: ProductId) -> i64 {
        self.store
            .get_stock(product_id, self.warehouse.id)
            .await
            .unwrap()
            .map(|s| s.quantity)
            .unwrap_or(0)
    }
}

pub(crate) fn adjust_in(product_id: ProductId, warehouse_id: WarehouseId, quantity: u32) -> AdjustStock {
    AdjustStock {
        product_id,
        warehouse_id,
        quantity,
        direction: Direction::In,
        reason: MutationReason::Purchase,
        performed_by: UserId::new(),
        notes: None,
        reference_id: None,
    }
}

pub(crate) fn order_for(warehouse_id: WarehouseId, items: &[(ProductId, u32)]) -> CreateOrder {
    CreateOrder {
        warehouse_id,
        customer_name: "Sultan Buyer".to_string(),
        items: items
            .iter()
            .map(|(product_id, quantity)| OrderItemRequest {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
    }
}
