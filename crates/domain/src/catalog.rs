//! Master data: products and warehouses.

use chrono::{DateTime, Utc};
use common::{ProductId, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// Upper-cases and trims a SKU or warehouse code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn require_len(field: &str, value: &str, min: usize) -> Result<(), DomainError> {
    if value.trim().chars().count() < min {
        return Err(DomainError::validation(format!(
            "{field} must be at least {min} characters"
        )));
    }
    Ok(())
}

/// A catalog product. Referenced, never owned, by stock and order lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub tags: Vec<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to register a product.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial product update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub tags: Option<Vec<String>>,
}

impl Product {
    /// Builds a product from validated input with a fresh id.
    pub fn create(input: NewProduct) -> Result<Self, DomainError> {
        require_len("sku", &input.sku, 3)?;
        require_len("name", &input.name, 3)?;
        if input.price.is_negative() {
            return Err(DomainError::validation("price must not be negative"));
        }

        let now = Utc::now();
        Ok(Self {
            id: ProductId::new(),
            sku: normalize_code(&input.sku),
            name: input.name.trim().to_string(),
            description: input.description,
            price: input.price,
            tags: input.tags,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a partial update in place.
    pub fn apply_patch(&mut self, patch: ProductPatch) -> Result<(), DomainError> {
        if let Some(name) = patch.name {
            require_len("name", &name, 3)?;
            self.name = name.trim().to_string();
        }
        if let Some(price) = patch.price {
            if price.is_negative() {
                return Err(DomainError::validation("price must not be negative"));
            }
            self.price = price;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Returns true if the product can be stocked and ordered.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

/// A physical location holding stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub code: String,
    pub name: String,
    pub address: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to register a warehouse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewWarehouse {
    pub code: String,
    pub name: String,
    pub address: String,
    pub description: Option<String>,
}

/// Partial warehouse update. The code is immutable once assigned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarehousePatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
}

impl Warehouse {
    /// Builds a warehouse from validated input with a fresh id.
    pub fn create(input: NewWarehouse) -> Result<Self, DomainError> {
        let code = normalize_code(&input.code);
        if !(3..=10).contains(&code.chars().count()) {
            return Err(DomainError::validation(
                "code must be between 3 and 10 characters",
            ));
        }
        require_len("name", &input.name, 3)?;
        require_len("address", &input.address, 5)?;

        let now = Utc::now();
        Ok(Self {
            id: WarehouseId::new(),
            code,
            name: input.name.trim().to_string(),
            address: input.address.trim().to_string(),
            description: input.description,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a partial update in place.
    pub fn apply_patch(&mut self, patch: WarehousePatch) -> Result<(), DomainError> {
        if let Some(name) = patch.name {
            require_len("name", &name, 3)?;
            self.name = name.trim().to_string();
        }
        if let Some(address) = patch.address {
            require_len("address", &address, 5)?;
            self.address = address.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
