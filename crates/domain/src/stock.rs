//! Stock records and their audit trail.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{MutationId, ProductId, StockId, UserId, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// Low-stock threshold assigned to lazily created stock records.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Direction of a stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(Direction::In),
            "OUT" => Ok(Direction::Out),
            other => Err(DomainError::UnknownValue {
                kind: "direction",
                value: other.to_string(),
            }),
        }
    }
}

/// Why a stock change happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MutationReason {
    Purchase,
    Sale,
    Adjustment,
    Transfer,
    Return,
}

impl MutationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationReason::Purchase => "PURCHASE",
            MutationReason::Sale => "SALE",
            MutationReason::Adjustment => "ADJUSTMENT",
            MutationReason::Transfer => "TRANSFER",
            MutationReason::Return => "RETURN",
        }
    }
}

impl std::fmt::Display for MutationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationReason {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PURCHASE" => Ok(MutationReason::Purchase),
            "SALE" => Ok(MutationReason::Sale),
            "ADJUSTMENT" => Ok(MutationReason::Adjustment),
            "TRANSFER" => Ok(MutationReason::Transfer),
            "RETURN" => Ok(MutationReason::Return),
            other => Err(DomainError::UnknownValue {
                kind: "mutation reason",
                value: other.to_string(),
            }),
        }
    }
}

/// Quantity on hand for one product in one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: StockId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub low_stock_threshold: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stock {
    /// An empty stock record for a pair that has never been stocked.
    pub fn empty(product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        let now = Utc::now();
        Self {
            id: StockId::new(),
            product_id,
            warehouse_id,
            quantity: 0,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            created_at: now,
            updated_at: now,
        }
    }

    /// Computes the signed delta for a change, rejecting decrements below zero.
    ///
    /// Nothing is mutated; the caller persists the delta.
    pub fn delta_for(&self, direction: Direction, quantity: u32) -> Result<i64, DomainError> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be greater than 0"));
        }
        let amount = i64::from(quantity);
        match direction {
            Direction::In => {
                self.quantity
                    .checked_add(amount)
                    .ok_or_else(|| DomainError::validation("stock quantity overflow"))?;
                Ok(amount)
            }
            Direction::Out => {
                if self.quantity < amount {
                    return Err(DomainError::InsufficientStock {
                        current: self.quantity,
                        requested: quantity,
                    });
                }
                Ok(-amount)
            }
        }
    }

    pub fn is_low(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }
}

/// Immutable audit record of one stock change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMutation {
    pub id: MutationId,
    pub stock_id: StockId,
    #[serde(rename = "type")]
    pub direction: Direction,
    pub quantity: u32,
    pub reason: MutationReason,
    pub notes: Option<String>,
    pub reference_id: Option<String>,
    pub performed_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Stock joined with the display fields of its product and warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockView {
    pub stock_id: StockId,
    pub quantity: i64,
    pub low_stock_threshold: i64,
    pub low_stock: bool,
    pub product_id: ProductId,
    pub product_sku: String,
    pub product_name: String,
    pub product_price: Money,
    pub warehouse_id: WarehouseId,
    pub warehouse_code: String,
    pub warehouse_name: String,
    pub updated_at: DateTime<Utc>,
}
