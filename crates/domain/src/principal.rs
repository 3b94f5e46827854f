//! The authenticated caller, as supplied by the identity collaborator.

use std::collections::HashSet;
use std::str::FromStr;

use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Role of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Staff,
}

impl Role {
    /// Elevated roles may act on orders they did not create.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "staff" => Ok(Role::Staff),
            other => Err(DomainError::UnknownValue {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// A granted capability. `All` implies every other permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "inventory.view")]
    InventoryView,
    #[serde(rename = "inventory.manage")]
    InventoryManage,
    #[serde(rename = "stock.adjust")]
    StockAdjust,
    #[serde(rename = "order.view")]
    OrderView,
    #[serde(rename = "order.create")]
    OrderCreate,
    #[serde(rename = "order.manage")]
    OrderManage,
    #[serde(rename = "all")]
    All,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::InventoryView => "inventory.view",
            Permission::InventoryManage => "inventory.manage",
            Permission::StockAdjust => "stock.adjust",
            Permission::OrderView => "order.view",
            Permission::OrderCreate => "order.create",
            Permission::OrderManage => "order.manage",
            Permission::All => "all",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "inventory.view" => Ok(Permission::InventoryView),
            "inventory.manage" => Ok(Permission::InventoryManage),
            "stock.adjust" => Ok(Permission::StockAdjust),
            "order.view" => Ok(Permission::OrderView),
            "order.create" => Ok(Permission::OrderCreate),
            "order.manage" => Ok(Permission::OrderManage),
            "all" => Ok(Permission::All),
            other => Err(DomainError::UnknownValue {
                kind: "permission",
                value: other.to_string(),
            }),
        }
    }
}

/// An already-authenticated caller. The core trusts these fields as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    pub permissions: HashSet<Permission>,
}

impl Principal {
    pub fn new(
        user_id: UserId,
        role: Role,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            user_id,
            role,
            permissions: permissions.into_iter().collect(),
        }
    }

    /// A principal holding the `all` permission.
    pub fn admin(user_id: UserId) -> Self {
        Self::new(user_id, Role::Admin, [Permission::All])
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&Permission::All) || self.permissions.contains(&permission)
    }

    /// True if the principal holds at least one of `required`.
    pub fn has_any(&self, required: &[Permission]) -> bool {
        required.iter().any(|p| self.has(*p))
    }

    /// Staff who may see and act on every order, not only their own.
    pub fn can_manage_orders(&self) -> bool {
        self.role.is_elevated() || self.has(Permission::OrderManage)
    }
}
