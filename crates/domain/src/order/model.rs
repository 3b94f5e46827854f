//! Order and line snapshots.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::error::DomainError;
use crate::money::Money;

use super::OrderStatus;

/// A line item frozen at order-creation time.
///
/// Later edits to the product never change a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub price: Money,
    pub quantity: u32,
}

impl OrderLine {
    /// Captures the product's current SKU, name and price.
    pub fn snapshot(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            price: product.price,
            quantity,
        }
    }

    /// Returns `price × quantity`, or `None` on overflow.
    pub fn subtotal(&self) -> Option<Money> {
        self.price.checked_multiply(self.quantity)
    }
}

/// A customer order fulfilled from one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub customer_name: String,
    pub warehouse_id: WarehouseId,
    pub created_by: UserId,
    pub items: Vec<OrderLine>,
    pub total_amount: Money,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a pending order, computing the total from the line snapshots.
    pub fn place(
        order_number: String,
        customer_name: String,
        warehouse_id: WarehouseId,
        created_by: UserId,
        items: Vec<OrderLine>,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::Validation(
                "order must have at least 1 item".to_string(),
            ));
        }
        let total_amount = total_of(&items)?;
        let now = Utc::now();

        Ok(Self {
            id: OrderId::new(),
            order_number,
            status: OrderStatus::Pending,
            customer_name,
            warehouse_id,
            created_by,
            items,
            total_amount,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.created_by == user_id
    }
}

/// Sums line subtotals with overflow checking.
pub fn total_of(items: &[OrderLine]) -> Result<Money, DomainError> {
    items.iter().try_fold(Money::zero(), |acc, line| {
        line.subtotal()
            .and_then(|subtotal| acc.checked_add(subtotal))
            .ok_or_else(|| DomainError::Validation("order total overflow".to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: u32) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(),
            sku: "LAPTOP-001".to_string(),
            name: "MacBook Pro M3".to_string(),
            price: Money::from_cents(price),
            quantity,
        }
    }

    #[test]
    fn test_total_is_sum_of_snapshots() {
        let order = Order::place(
            "ORD-1-ABC".to_string(),
            "Sultan Buyer".to_string(),
            WarehouseId::new(),
            UserId::new(),
            vec![line(25_000_000, 2), line(1_000, 3)],
        )
        .unwrap();
        assert_eq!(order.total_amount.cents(), 50_003_000);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_empty_order_rejected() {
        let result = Order::place(
            "ORD-1-ABC".to_string(),
            "Sultan Buyer".to_string(),
            WarehouseId::new(),
            UserId::new(),
            vec![],
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_total_overflow_rejected() {
        assert!(total_of(&[line(i64::MAX, 2)]).is_err());
    }
}
