use async_trait::async_trait;
use common::{MutationId, OrderId, ProductId, StockId, UserId, WarehouseId};
use domain::{
    Direction, Money, MutationReason, Order, OrderLine, OrderStatus, Product, Stock,
    StockMutation, StockView, Warehouse,
};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OrderQuery, Result, StoreError,
    store::{InventoryStore, StoreTransaction},
};

const WAREHOUSE_COLUMNS: &str =
    "id, code, name, address, description, created_at, updated_at";
const PRODUCT_COLUMNS: &str =
    "id, sku, name, description, price_cents, tags, is_deleted, created_at, updated_at";
const STOCK_COLUMNS: &str =
    "id, product_id, warehouse_id, quantity, low_stock_threshold, created_at, updated_at";
const MUTATION_COLUMNS: &str = "id, stock_id, direction, quantity, reason, notes, reference_id, performed_by, created_at";
const ORDER_COLUMNS: &str = "id, order_number, status, customer_name, warehouse_id, created_by, items, total_amount_cents, cancel_reason, created_at, updated_at";

/// Maps constraint failures to their store-level meaning.
fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.code().as_deref() {
            Some("23505") => {
                return StoreError::duplicate(db_err.constraint().unwrap_or("unique"));
            }
            Some("23503") | Some("23514") => {
                return StoreError::ConstraintViolation(db_err.message().to_string());
            }
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn corrupt(err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

fn row_to_warehouse(row: PgRow) -> Result<Warehouse> {
    Ok(Warehouse {
        id: WarehouseId::from_uuid(row.try_get::<Uuid, _>("id")?),
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        sku: row.try_get("sku")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        tags: row.try_get("tags")?,
        is_deleted: row.try_get("is_deleted")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_stock(row: PgRow) -> Result<Stock> {
    Ok(Stock {
        id: StockId::from_uuid(row.try_get::<Uuid, _>("id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        warehouse_id: WarehouseId::from_uuid(row.try_get::<Uuid, _>("warehouse_id")?),
        quantity: row.try_get("quantity")?,
        low_stock_threshold: row.try_get("low_stock_threshold")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_mutation(row: PgRow) -> Result<StockMutation> {
    let direction: String = row.try_get("direction")?;
    let reason: String = row.try_get("reason")?;
    let quantity: i64 = row.try_get("quantity")?;

    Ok(StockMutation {
        id: MutationId::from_uuid(row.try_get::<Uuid, _>("id")?),
        stock_id: StockId::from_uuid(row.try_get::<Uuid, _>("stock_id")?),
        direction: direction.parse::<Direction>().map_err(corrupt)?,
        quantity: u32::try_from(quantity).map_err(corrupt)?,
        reason: reason.parse::<MutationReason>().map_err(corrupt)?,
        notes: row.try_get("notes")?,
        reference_id: row.try_get("reference_id")?,
        performed_by: UserId::from_uuid(row.try_get::<Uuid, _>("performed_by")?),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let items: serde_json::Value = row.try_get("items")?;
    let items: Vec<OrderLine> = serde_json::from_value(items)?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_number: row.try_get("order_number")?,
        status: status.parse::<OrderStatus>().map_err(corrupt)?,
        customer_name: row.try_get("customer_name")?,
        warehouse_id: WarehouseId::from_uuid(row.try_get::<Uuid, _>("warehouse_id")?),
        created_by: UserId::from_uuid(row.try_get::<Uuid, _>("created_by")?),
        items,
        total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
        cancel_reason: row.try_get("cancel_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_stock_view(row: PgRow) -> Result<StockView> {
    let quantity: i64 = row.try_get("quantity")?;
    let low_stock_threshold: i64 = row.try_get("low_stock_threshold")?;

    Ok(StockView {
        stock_id: StockId::from_uuid(row.try_get::<Uuid, _>("stock_id")?),
        quantity,
        low_stock_threshold,
        low_stock: quantity <= low_stock_threshold,
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        product_sku: row.try_get("product_sku")?,
        product_name: row.try_get("product_name")?,
        product_price: Money::from_cents(row.try_get("product_price_cents")?),
        warehouse_id: WarehouseId::from_uuid(row.try_get::<Uuid, _>("warehouse_id")?),
        warehouse_code: row.try_get("warehouse_code")?,
        warehouse_name: row.try_get("warehouse_name")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// PostgreSQL-backed inventory store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO warehouses (id, code, name, address, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(warehouse.id.as_uuid())
        .bind(&warehouse.code)
        .bind(&warehouse.name)
        .bind(&warehouse.address)
        .bind(&warehouse.description)
        .bind(warehouse.created_at)
        .bind(warehouse.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>> {
        let sql = format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_warehouse).transpose()
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        let sql = format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses ORDER BY code ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_warehouse).collect()
    }

    async fn update_warehouse(&self, warehouse: &Warehouse) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE warehouses
            SET name = $2, address = $3, description = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(warehouse.id.as_uuid())
        .bind(&warehouse.name)
        .bind(&warehouse.address)
        .bind(&warehouse.description)
        .bind(warehouse.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Warehouse", warehouse.id));
        }
        Ok(())
    }

    async fn delete_warehouse(&self, id: WarehouseId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM warehouses WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_stocked_items(&self, id: WarehouseId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stocks WHERE warehouse_id = $1 AND quantity > 0",
        )
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, description, price_cents, tags, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.tags)
        .bind(product.is_deleted)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_product).transpose()
    }

    async fn list_products(&self, include_deleted: bool) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE $1 OR NOT is_deleted ORDER BY sku ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(include_deleted)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_product).collect()
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, price_cents = $4, tags = $5, is_deleted = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.tags)
        .bind(product.is_deleted)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", product.id));
        }
        Ok(())
    }

    async fn get_stock(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Option<Stock>> {
        let sql = format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE product_id = $1 AND warehouse_id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(product_id.as_uuid())
            .bind(warehouse_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_stock).transpose()
    }

    async fn stock_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<StockView>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id AS stock_id, s.quantity, s.low_stock_threshold, s.updated_at,
                   p.id AS product_id, p.sku AS product_sku, p.name AS product_name,
                   p.price_cents AS product_price_cents,
                   w.id AS warehouse_id, w.code AS warehouse_code, w.name AS warehouse_name
            FROM stocks s
            JOIN products p ON p.id = s.product_id
            JOIN warehouses w ON w.id = s.warehouse_id
            WHERE s.warehouse_id = $1
            ORDER BY p.sku ASC
            "#,
        )
        .bind(warehouse_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_stock_view).collect()
    }

    async fn mutations_for_stock(&self, stock_id: StockId) -> Result<Vec<StockMutation>> {
        let sql = format!(
            "SELECT {MUTATION_COLUMNS} FROM stock_mutations WHERE stock_id = $1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(stock_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_mutation).collect()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_order).transpose()
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        if query.created_by.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_by = ${param_count}"));
        }
        if query.warehouse_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND warehouse_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(user_id) = query.created_by {
            sqlx_query = sqlx_query.bind(user_id.as_uuid());
        }
        if let Some(warehouse_id) = query.warehouse_id {
            sqlx_query = sqlx_query.bind(warehouse_id.as_uuid());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_order).collect()
    }
}

/// Transaction handle for [`PostgresStore`].
///
/// Dropping it without a commit makes sqlx roll the transaction back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_product).transpose()
    }

    async fn get_warehouse(&mut self, id: WarehouseId) -> Result<Option<Warehouse>> {
        let sql = format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_warehouse).transpose()
    }

    async fn lock_or_create_stock(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Stock> {
        let empty = Stock::empty(product_id, warehouse_id);
        sqlx::query(
            r#"
            INSERT INTO stocks (id, product_id, warehouse_id, quantity, low_stock_threshold, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $5, $6)
            ON CONFLICT (product_id, warehouse_id) DO NOTHING
            "#,
        )
        .bind(empty.id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(warehouse_id.as_uuid())
        .bind(empty.low_stock_threshold)
        .bind(empty.created_at)
        .bind(empty.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        let sql = format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE product_id = $1 AND warehouse_id = $2 FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(product_id.as_uuid())
            .bind(warehouse_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await?;
        row_to_stock(row)
    }

    async fn apply_stock_delta(&mut self, stock_id: StockId, delta: i64) -> Result<Stock> {
        let sql = format!(
            "UPDATE stocks SET quantity = quantity + $2, updated_at = NOW() WHERE id = $1 RETURNING {STOCK_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(stock_id.as_uuid())
            .bind(delta)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        match row {
            Some(row) => row_to_stock(row),
            None => Err(StoreError::not_found("Stock", stock_id)),
        }
    }

    async fn insert_mutation(&mut self, mutation: &StockMutation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_mutations (id, stock_id, direction, quantity, reason, notes, reference_id, performed_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(mutation.id.as_uuid())
        .bind(mutation.stock_id.as_uuid())
        .bind(mutation.direction.as_str())
        .bind(i64::from(mutation.quantity))
        .bind(mutation.reason.as_str())
        .bind(&mutation.notes)
        .bind(&mutation.reference_id)
        .bind(mutation.performed_by.as_uuid())
        .bind(mutation.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let items = serde_json::to_value(&order.items)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, status, customer_name, warehouse_id, created_by, items, total_amount_cents, cancel_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_number)
        .bind(order.status.as_str())
        .bind(&order.customer_name)
        .bind(order.warehouse_id.as_uuid())
        .bind(order.created_by.as_uuid())
        .bind(items)
        .bind(order.total_amount.cents())
        .bind(&order.cancel_reason)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_order).transpose()
    }

    async fn update_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        cancel_reason: Option<&str>,
    ) -> Result<Order> {
        let sql = format!(
            r#"
            UPDATE orders
            SET status = $2, cancel_reason = COALESCE($3, cancel_reason), updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(status.as_str())
            .bind(cancel_reason)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        match row {
            Some(row) => row_to_order(row),
            None => Err(StoreError::not_found("Order", id)),
        }
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
