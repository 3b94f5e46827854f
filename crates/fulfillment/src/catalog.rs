//! Warehouse and product master data.

use common::{ProductId, WarehouseId};
use domain::{NewProduct, NewWarehouse, Product, ProductPatch, Warehouse, WarehousePatch};
use store::{InventoryStore, StoreError};
use tracing::instrument;

use crate::error::{FulfillmentError, Result};

/// CRUD over warehouses and products.
#[derive(Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S: InventoryStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_warehouse(&self, input: NewWarehouse) -> Result<Warehouse> {
        let warehouse = Warehouse::create(input)?;
        self.store
            .insert_warehouse(&warehouse)
            .await
            .map_err(|err| duplicate_as(err, "Warehouse code already exists"))?;
        tracing::info!(warehouse_id = %warehouse.id, "warehouse created");
        Ok(warehouse)
    }

    pub async fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        Ok(self.store.list_warehouses().await?)
    }

    pub async fn get_warehouse(&self, id: WarehouseId) -> Result<Warehouse> {
        self.store
            .get_warehouse(id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("Warehouse", id))
    }

    #[instrument(skip(self, patch))]
    pub async fn update_warehouse(&self, id: WarehouseId, patch: WarehousePatch) -> Result<Warehouse> {
        let mut warehouse = self.get_warehouse(id).await?;
        warehouse.apply_patch(patch)?;
        self.store.update_warehouse(&warehouse).await?;
        Ok(warehouse)
    }

    /// Deletes a warehouse that never held stock and has no orders.
    ///
    /// The store refuses the delete atomically, so a stock record created
    /// after the quantity check still blocks it.
    #[instrument(skip(self))]
    pub async fn delete_warehouse(&self, id: WarehouseId) -> Result<()> {
        if self.store.count_stocked_items(id).await? > 0 {
            return Err(FulfillmentError::Validation(
                "Cannot delete warehouse with active stock".to_string(),
            ));
        }
        let deleted = self.store.delete_warehouse(id).await.map_err(|err| match err {
            StoreError::ConstraintViolation(_) => FulfillmentError::Validation(
                "Cannot delete warehouse with stock history or orders".to_string(),
            ),
            other => other.into(),
        })?;
        if !deleted {
            return Err(FulfillmentError::not_found("Warehouse", id));
        }
        tracing::info!("warehouse deleted");
        Ok(())
    }

    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_product(&self, input: NewProduct) -> Result<Product> {
        let product = Product::create(input)?;
        self.store
            .insert_product(&product)
            .await
            .map_err(|err| duplicate_as(err, "Product SKU already exists"))?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Lists active products; soft-deleted ones only when asked.
    pub async fn list_products(&self, include_deleted: bool) -> Result<Vec<Product>> {
        Ok(self.store.list_products(include_deleted).await?)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.store
            .get_product(id)
            .await?
            .filter(Product::is_active)
            .ok_or_else(|| FulfillmentError::not_found("Product", id))
    }

    #[instrument(skip(self, patch))]
    pub async fn update_product(&self, id: ProductId, patch: ProductPatch) -> Result<Product> {
        let mut product = self.get_product(id).await?;
        product.apply_patch(patch)?;
        self.store.update_product(&product).await?;
        Ok(product)
    }

    /// Soft-deletes a product. Its stock rows and past order lines stay.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut product = self.get_product(id).await?;
        product.is_deleted = true;
        product.updated_at = chrono::Utc::now();
        self.store.update_product(&product).await?;
        tracing::info!("product deleted");
        Ok(())
    }
}

fn duplicate_as(err: StoreError, message: &str) -> FulfillmentError {
    match err {
        StoreError::DuplicateKey { .. } => FulfillmentError::DuplicateKey(message.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Money;
    use store::InMemoryStore;

    fn catalog() -> CatalogService<InMemoryStore> {
        CatalogService::new(InMemoryStore::new())
    }

    fn main_warehouse() -> NewWarehouse {
        NewWarehouse {
            code: "wh-01".to_string(),
            name: "Gudang Pusat".to_string(),
            address: "Jl. Sudirman 1, Jakarta".to_string(),
            description: None,
        }
    }

    fn laptop() -> NewProduct {
        NewProduct {
            sku: "LAPTOP-001".to_string(),
            name: "MacBook Pro M3".to_string(),
            price: Money::from_cents(25_000_000),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_warehouse_code() {
        let catalog = catalog();
        let created = catalog.create_warehouse(main_warehouse()).await.unwrap();
        assert_eq!(created.code, "WH-01");

        let err = catalog.create_warehouse(main_warehouse()).await.unwrap_err();

        assert!(matches!(err, FulfillmentError::DuplicateKey(msg) if msg.contains("code")));
    }

    #[tokio::test]
    async fn test_invalid_warehouse_is_rejected() {
        let catalog = catalog();

        let err = catalog
            .create_warehouse(NewWarehouse {
                code: "W1".to_string(),
                ..main_warehouse()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FulfillmentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete_warehouse() {
        let catalog = catalog();
        let warehouse = catalog.create_warehouse(main_warehouse()).await.unwrap();

        let updated = catalog
            .update_warehouse(
                warehouse.id,
                WarehousePatch {
                    name: Some("Gudang Utama".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Gudang Utama");

        catalog.delete_warehouse(warehouse.id).await.unwrap();
        let err = catalog.get_warehouse(warehouse.id).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::NotFound { .. }));

        let err = catalog.delete_warehouse(warehouse.id).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_warehouse_with_emptied_stock_keeps_history() {
        let fx = crate::testing::Fixture::new().await;
        let catalog = CatalogService::new(fx.store.clone());
        let product = fx.stocked_product("LAPTOP-001", 100, 5).await;
        let mut out = crate::testing::adjust_in(product.id, fx.warehouse.id, 5);
        out.direction = domain::Direction::Out;
        let stock = fx.ledger.adjust(out, None).await.unwrap();
        assert_eq!(stock.quantity, 0);

        let err = catalog.delete_warehouse(fx.warehouse.id).await.unwrap_err();

        assert!(matches!(err, FulfillmentError::Validation(_)));
        assert!(catalog.get_warehouse(fx.warehouse.id).await.is_ok());
        assert_eq!(fx.ledger.mutations_for_stock(stock.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_product_soft_delete() {
        let catalog = catalog();
        let product = catalog.create_product(laptop()).await.unwrap();

        catalog.delete_product(product.id).await.unwrap();

        assert!(catalog.list_products(false).await.unwrap().is_empty());
        assert_eq!(catalog.list_products(true).await.unwrap().len(), 1);
        let err = catalog.get_product(product.id).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let catalog = catalog();
        catalog.create_product(laptop()).await.unwrap();

        let err = catalog.create_product(laptop()).await.unwrap_err();

        assert!(matches!(err, FulfillmentError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_update_product_price() {
        let catalog = catalog();
        let product = catalog.create_product(laptop()).await.unwrap();

        let updated = catalog
            .update_product(
                product.id,
                ProductPatch {
                    price: Some(Money::from_cents(24_000_000)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.price, Money::from_cents(24_000_000));
        assert_eq!(
            catalog.get_product(product.id).await.unwrap().price,
            Money::from_cents(24_000_000)
        );
    }
}
